//! `SampleApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameRecorder;
use winit::event::WindowEvent;

/// Trait for vkframes sample applications.
///
/// The runner owns the window, GPU context and frame loop; the app records
/// each frame through its [`FrameRecorder`] implementation and rebuilds
/// size-dependent resources in
/// [`FrameRecorder::on_swapchain_recreated`].
pub trait SampleApp: FrameRecorder + Sized {
    /// Initialize the application.
    ///
    /// Called once after the GPU context and the first swapchain exist.
    fn init(ctx: &AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called every iteration before the frame is recorded.
    ///
    /// # Arguments
    /// * `ctx` - Application context
    /// * `dt` - Delta time in seconds since the last iteration
    #[allow(unused_variables)]
    fn update(&mut self, ctx: &AppContext, dt: f32) {}

    /// Handle a window event.
    ///
    /// Return `true` if the event was handled and should not be processed further.
    #[allow(unused_variables)]
    fn on_event(&mut self, ctx: &mut AppContext, event: &WindowEvent) -> bool {
        false
    }

    /// Release GPU resources before shutdown.
    ///
    /// The device is idle when this is called.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &AppContext) {}
}
