//! Application context.

use std::sync::Arc;

use ash::vk;
use vkframes_gpu::{FrameDevice, GpuContext};

use crate::frame_loop::FrameLoop;

/// Application context shared across all app methods.
///
/// Mirrors the current swapchain parameters and collects requests the app
/// makes of the runner (present mode switches, exit).
pub struct AppContext {
    /// GPU context with device, queue and allocator.
    pub gpu: Arc<GpuContext>,
    extent: vk::Extent2D,
    format: vk::Format,
    present_mode: vk::PresentModeKHR,
    frames_in_flight: usize,
    frame_count: u64,
    requested_present_mode: Option<vk::PresentModeKHR>,
    exit_requested: bool,
}

impl AppContext {
    pub(crate) fn new<B: FrameDevice>(gpu: Arc<GpuContext>, frame_loop: &FrameLoop<B>) -> Self {
        let mut ctx = Self {
            gpu,
            extent: vk::Extent2D::default(),
            format: vk::Format::UNDEFINED,
            present_mode: vk::PresentModeKHR::FIFO,
            frames_in_flight: frame_loop.sync().frames_in_flight(),
            frame_count: 0,
            requested_present_mode: None,
            exit_requested: false,
        };
        ctx.sync_with(frame_loop);
        ctx
    }

    /// Refresh the mirrored swapchain parameters.
    pub(crate) fn sync_with<B: FrameDevice>(&mut self, frame_loop: &FrameLoop<B>) {
        let swapchain = frame_loop.swapchain();
        self.extent = swapchain.extent();
        self.format = swapchain.format();
        self.present_mode = swapchain.present_mode();
        self.frame_count = frame_loop.frame_number();
    }

    /// Get the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }

    /// Format of the swapchain images.
    pub fn swapchain_format(&self) -> vk::Format {
        self.format
    }

    /// Present mode the current swapchain was created with.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Total frames presented.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Ask the runner to rebuild the swapchain with `mode` (FIFO if unsupported).
    pub fn request_present_mode(&mut self, mode: vk::PresentModeKHR) {
        self.requested_present_mode = Some(mode);
    }

    pub(crate) fn take_present_mode_request(&mut self) -> Option<vk::PresentModeKHR> {
        self.requested_present_mode.take()
    }

    /// Ask the runner to stop after the current frame.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }
}
