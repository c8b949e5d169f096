//! Application runner and main loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use ash::vk;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
#[cfg(feature = "profiling-tracy")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vkframes_gpu::{GpuContextBuilder, SurfaceContext, SwapchainConfig, SyncStrategy};
use vkframes_platform::{PlatformConfig, PlatformWindow, WindowSurface};

use crate::app::SampleApp;
use crate::context::AppContext;
use crate::frame_loop::{FrameLoop, FrameLoopConfig, FrameOutcome};
use crate::stats::FrameStats;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Present mode used when the surface supports it, FIFO otherwise.
    pub present_mode: vk::PresentModeKHR,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    pub frames_in_flight: usize,
    pub sync_strategy: SyncStrategy,
    /// Stop after this many presented frames.
    pub frame_limit: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "vkframes".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            present_mode: vk::PresentModeKHR::MAILBOX,
            validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            sync_strategy: SyncStrategy::Fences,
            frame_limit: None,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    pub fn with_present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.present_mode = mode;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.sync_strategy = strategy;
        self
    }

    /// Stop after `frames` presented frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Frame loop settings derived from this config.
    pub fn frame_loop_config(&self) -> FrameLoopConfig {
        FrameLoopConfig {
            frames_in_flight: self.frames_in_flight,
            sync_strategy: self.sync_strategy,
            swapchain: SwapchainConfig {
                preferred_present_mode: self.present_mode,
                ..Default::default()
            },
        }
    }

    fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: true,
        }
    }

    fn target_frame_time(&self) -> Option<Duration> {
        self.target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)))
    }
}

/// Filter used when `RUST_LOG` is unset.
#[cfg(feature = "profiling-tracy")]
const DEFAULT_LOG_FILTER: &str = "info,vkframes_app=trace,vkframes_gpu=trace,vkframes_clear=trace";
#[cfg(not(feature = "profiling-tracy"))]
const DEFAULT_LOG_FILTER: &str = "info";

/// Install the global `tracing` subscriber (`RUST_LOG`, default `info`).
///
/// With `profiling-tracy`, frame spans are also streamed to Tracy.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    #[cfg(feature = "profiling-tracy")]
    {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(tracing_tracy::TracyLayer::default())
            .try_init();
    }
    #[cfg(not(feature = "profiling-tracy"))]
    {
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    }
}

/// Run a sample app with the given configuration.
///
/// Initializes logging, creates the window, GPU context and frame loop, and
/// loops until the window closes, the app asks to exit, the frame limit is
/// reached or a fatal error occurs.
pub fn run_app<A: SampleApp>(config: AppConfig) -> anyhow::Result<()> {
    init_logging();

    info!("{} starting...", config.title);

    let mut window = PlatformWindow::new(config.platform_config())?;

    let gpu = Arc::new(
        GpuContextBuilder::new()
            .app_name(&config.title)
            .validation(config.validation)
            .display(window.raw_display_handle()?)
            .build()?,
    );

    // SAFETY: The window outlives the surface; the frame loop and its
    // surface are torn down below before `window` is dropped.
    let surface = unsafe { SurfaceContext::from_window(&gpu, window.window())? };

    let Some(extent) = wait_for_visible(&mut window) else {
        info!("Window closed before the first frame");
        return Ok(());
    };

    let mut frame_loop = FrameLoop::new(surface, extent, config.frame_loop_config())
        .context("Failed to create frame loop")?;

    let mut ctx = AppContext::new(Arc::clone(&gpu), &frame_loop);
    let mut app = match A::init(&ctx) {
        Ok(app) => app,
        Err(e) => {
            drop(frame_loop.shutdown());
            return Err(e.context("Failed to initialize application"));
        }
    };

    info!("Application ready!");

    let target_frame_time = config.target_frame_time();
    let mut stats = FrameStats::new();
    let mut last_frame_time = Instant::now();
    let mut fatal = None;

    while !window.should_close() && !ctx.exit_requested() {
        let frame_start = Instant::now();
        let dt = frame_start.duration_since(last_frame_time);
        last_frame_time = frame_start;

        for event in window.drain_events() {
            app.on_event(&mut ctx, &event);
        }
        if let Some(mode) = ctx.take_present_mode_request() {
            frame_loop.set_preferred_present_mode(mode);
        }

        app.update(&ctx, dt.as_secs_f32());

        match frame_loop.run_once(&mut window, &mut app) {
            Ok(outcome) => {
                stats.record(outcome);
                if matches!(outcome, FrameOutcome::Presented { .. }) {
                    stats.record_frame_time(dt);
                }
            }
            Err(e) => {
                error!("Fatal frame error: {e}");
                fatal = Some(e);
                break;
            }
        }
        ctx.sync_with(&frame_loop);

        if config
            .frame_limit
            .is_some_and(|limit| stats.presented >= limit)
        {
            info!("Frame limit reached");
            break;
        }

        // Frame pacing
        if let Some(target) = target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }
    }

    stats.log_summary();

    info!("Starting cleanup...");
    if let Err(e) = gpu.wait_idle() {
        error!("Failed to wait idle: {e}");
    }
    app.cleanup(&ctx);
    drop(app);
    drop(frame_loop.shutdown());
    drop(ctx);
    drop(gpu);
    info!("Cleanup complete");

    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Block until the framebuffer has a nonzero size. `None` if the window closes first.
fn wait_for_visible(window: &mut PlatformWindow) -> Option<vk::Extent2D> {
    loop {
        let (width, height) = window.framebuffer_size();
        if width > 0 && height > 0 {
            return Some(vk::Extent2D { width, height });
        }
        if window.should_close() {
            return None;
        }
        window.wait_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.sync_strategy, SyncStrategy::Fences);
        assert_eq!(config.validation, cfg!(debug_assertions));
        assert!(config.frame_limit.is_none());
    }

    #[test]
    fn builder_feeds_frame_loop_config() {
        let config = AppConfig::new("test")
            .with_frames_in_flight(3)
            .with_sync_strategy(SyncStrategy::Timeline)
            .with_present_mode(vk::PresentModeKHR::IMMEDIATE);
        let loop_config = config.frame_loop_config();
        assert_eq!(loop_config.frames_in_flight, 3);
        assert_eq!(loop_config.sync_strategy, SyncStrategy::Timeline);
        assert_eq!(
            loop_config.swapchain.preferred_present_mode,
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        if cfg!(feature = "profiling-tracy") {
            assert!(filter.to_string().contains("vkframes_app=trace"));
        } else {
            assert_eq!(filter.to_string(), "info");
        }
    }

    #[test]
    fn target_frame_time_ignores_zero() {
        assert_eq!(AppConfig::default().target_frame_time(), None);
        assert_eq!(
            AppConfig::default().with_target_fps(0).target_frame_time(),
            None
        );
        assert_eq!(
            AppConfig::default().with_target_fps(50).target_frame_time(),
            Some(Duration::from_millis(20))
        );
    }
}
