//! Frame loop errors.

use thiserror::Error;
use vkframes_gpu::GpuError;

/// Errors that can escape a frame.
#[derive(Error, Debug)]
pub enum FrameError {
    /// A Vulkan or swapchain failure.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// The frame recorder failed to record or rebuild its resources.
    #[error("Frame recorder failed: {0:#}")]
    Recorder(anyhow::Error),
}

impl FrameError {
    /// Whether dropping the frame and recreating the swapchain recovers from this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Gpu(e) => e.is_transient(),
            Self::Recorder(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
