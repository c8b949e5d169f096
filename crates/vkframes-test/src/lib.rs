//! Test harness for vkframes.
//!
//! Provides a GPU-free device, a scripted window and a recording frame
//! recorder, so the frame loop can be driven deterministically.

pub mod mock;

pub use mock::{
    default_support, AcquireScript, MockDevice, MockWindow, PresentScript, TraceRecorder,
};

use ash::vk;
use vkframes_app::{FrameLoop, FrameLoopConfig, FrameOutcome};

/// Shorthand for a [`vk::Extent2D`].
pub fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D { width, height }
}

/// Build a frame loop over `device` sized to `window`.
pub fn frame_loop(
    device: MockDevice,
    window: &MockWindow,
    config: FrameLoopConfig,
) -> vkframes_app::Result<FrameLoop<MockDevice>> {
    use vkframes_platform::WindowSurface;

    let (width, height) = window.framebuffer_size();
    FrameLoop::new(device, extent(width, height), config)
}

/// Run `count` iterations, stopping at the first error.
pub fn run_frames(
    frame_loop: &mut FrameLoop<MockDevice>,
    window: &mut MockWindow,
    recorder: &mut TraceRecorder,
    count: usize,
) -> vkframes_app::Result<Vec<FrameOutcome>> {
    (0..count)
        .map(|_| frame_loop.run_once(window, recorder))
        .collect()
}
