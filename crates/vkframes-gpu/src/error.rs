//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// Required device feature not supported.
    #[error("Required device feature not supported: {0}")]
    FeatureNotSupported(String),

    /// The surface reported no formats.
    #[error("Surface reports no supported formats")]
    NoSurfaceFormats,

    /// The surface reported no present modes.
    #[error("Surface reports no supported present modes")]
    NoPresentModes,

    /// The surface cannot back swapchain images with the requested usage.
    #[error("Surface does not support swapchain image usage {0:?}")]
    UnsupportedImageUsage(vk::ImageUsageFlags),

    /// The graphics queue family cannot present to the surface.
    #[error("Queue family {0} cannot present to the surface")]
    PresentNotSupported(u32),

    /// The surface currently has a zero-sized extent (e.g. minimized window).
    #[error("Surface extent is zero ({width}x{height})")]
    ZeroExtent { width: u32, height: u32 },

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(vk::Result),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`GpuError`], used to decide recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Startup misconfiguration. Fatal, never retried.
    Configuration,
    /// The swapchain no longer matches the surface. Recovered by recreating it.
    TransientPresentation,
    /// Any other driver failure. Fatal.
    Device,
}

impl GpuError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuitableDevice
            | Self::ExtensionNotSupported(_)
            | Self::FeatureNotSupported(_)
            | Self::NoSurfaceFormats
            | Self::NoPresentModes
            | Self::UnsupportedImageUsage(_)
            | Self::PresentNotSupported(_)
            | Self::SurfaceCreation(_) => ErrorKind::Configuration,
            Self::ZeroExtent { .. } => ErrorKind::TransientPresentation,
            Self::Vulkan(result) | Self::SwapchainCreation(result) => classify_result(*result),
            Self::AllocationFailed(_) | Self::InvalidState(_) | Self::Other(_) => ErrorKind::Device,
        }
    }

    /// Whether recreating the swapchain recovers from this error.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientPresentation
    }
}

fn classify_result(result: vk::Result) -> ErrorKind {
    match result {
        vk::Result::ERROR_OUT_OF_DATE_KHR
        | vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT => {
            ErrorKind::TransientPresentation
        }
        _ => ErrorKind::Device,
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_date_is_transient() {
        assert!(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR).is_transient());
        assert!(GpuError::SwapchainCreation(vk::Result::ERROR_OUT_OF_DATE_KHR).is_transient());
        assert!(GpuError::ZeroExtent {
            width: 0,
            height: 600
        }
        .is_transient());
    }

    #[test]
    fn device_lost_is_fatal() {
        let err = GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST);
        assert_eq!(err.kind(), ErrorKind::Device);
        assert!(!err.is_transient());
    }

    #[test]
    fn surface_problems_are_configuration() {
        assert_eq!(GpuError::NoSurfaceFormats.kind(), ErrorKind::Configuration);
        assert_eq!(GpuError::NoPresentModes.kind(), ErrorKind::Configuration);
        assert_eq!(
            GpuError::UnsupportedImageUsage(vk::ImageUsageFlags::TRANSFER_DST).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(GpuError::PresentNotSupported(0).kind(), ErrorKind::Configuration);
    }
}
