//! Per-frame context and the recording seam.

use ash::vk;
use vkframes_gpu::Swapchain;

/// Context for the frame being recorded.
///
/// The swapchain image arrives in an undefined layout and must be left in
/// `PRESENT_SRC_KHR`.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Command buffer for recording rendering commands, already begun.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired swapchain image.
    pub image_index: u32,
    /// The swapchain image for this frame.
    pub swapchain_image: vk::Image,
    pub swapchain_view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    /// Frame-in-flight slot the frame uses.
    pub slot: usize,
    /// Number of frames presented before this one.
    pub frame_number: u64,
}

/// Records the commands of each frame.
pub trait FrameRecorder {
    /// Record commands for one frame into `frame.command_buffer`.
    ///
    /// An error drops the frame; the loop recovers and carries on.
    fn record(&mut self, frame: &FrameContext) -> anyhow::Result<()>;

    /// Called after the swapchain was replaced, with the device idle.
    ///
    /// Rebuild anything that depends on the extent or format here.
    #[allow(unused_variables)]
    fn on_swapchain_recreated(&mut self, swapchain: &Swapchain) -> anyhow::Result<()> {
        Ok(())
    }
}
