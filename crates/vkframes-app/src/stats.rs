//! Frame statistics.

use crate::frame_loop::FrameOutcome;
use std::time::Duration;
use tracing::info;

/// Counters and FPS extremes collected by the runner.
#[derive(Debug, Clone)]
pub struct FrameStats {
    pub presented: u64,
    pub dropped: u64,
    pub recreated: u64,
    pub skipped: u64,
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
    fps_samples: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            presented: 0,
            dropped: 0,
            recreated: 0,
            skipped: 0,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
            fps_samples: 0,
        }
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the outcome of one loop iteration.
    pub fn record(&mut self, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Presented { .. } => self.presented += 1,
            FrameOutcome::Dropped => self.dropped += 1,
            FrameOutcome::Recreated => self.recreated += 1,
            FrameOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Track the time between two presented frames.
    pub fn record_frame_time(&mut self, dt: Duration) {
        let secs = dt.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let fps = 1.0 / secs;
        self.min_fps = self.min_fps.min(fps);
        self.max_fps = self.max_fps.max(fps);
        self.fps_sum += fps;
        self.fps_samples += 1;
    }

    pub fn min_fps(&self) -> Option<f64> {
        (self.fps_samples > 0).then_some(self.min_fps)
    }

    pub fn max_fps(&self) -> Option<f64> {
        (self.fps_samples > 0).then_some(self.max_fps)
    }

    pub fn avg_fps(&self) -> Option<f64> {
        (self.fps_samples > 0).then(|| self.fps_sum / self.fps_samples as f64)
    }

    /// Log the collected statistics.
    pub fn log_summary(&self) {
        info!("Frame statistics:");
        if let (Some(min), Some(max), Some(avg)) = (self.min_fps(), self.max_fps(), self.avg_fps()) {
            info!("  FPS min/max/avg: {min:.1} / {max:.1} / {avg:.1}");
        }
        info!("  Presented: {}", self.presented);
        info!("  Dropped: {}", self.dropped);
        info!("  Swapchain recreations: {}", self.recreated);
        if self.skipped > 0 {
            info!("  Skipped: {}", self.skipped);
        }
    }
}
