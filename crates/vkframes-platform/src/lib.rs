//! Platform abstraction for the vkframes samples.
//!
//! Provides the window/surface provider the frame loop polls, with a winit
//! implementation driven by `pump_app_events`.

pub mod window;

pub use window::PlatformWindow;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
    #[error("Window handle unavailable: {0}")]
    Handle(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "vkframes".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// What the frame loop needs from a window.
///
/// Events are processed synchronously on the calling thread; resize and close
/// requests are latched as flags between calls.
pub trait WindowSurface {
    /// Process pending events without blocking.
    fn poll_events(&mut self);

    /// Block until at least one event arrives, then process it.
    fn wait_events(&mut self);

    /// Current framebuffer size in physical pixels. Zero while minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Return and clear the resized flag.
    fn take_resized(&mut self) -> bool;

    /// Whether the window was asked to close.
    fn should_close(&self) -> bool;
}
