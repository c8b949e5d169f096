//! Frame lifecycle for the vkframes samples.
//!
//! This crate drives the acquire, record, submit and present cycle on top of
//! `vkframes-gpu`, and provides a small runner that handles the surrounding
//! boilerplate:
//! - Window and GPU context creation
//! - Swapchain recreation on resize, out-of-date and present mode changes
//! - Frames in flight with fences or a timeline semaphore
//! - Recovery from transient presentation and recording failures
//! - Frame pacing and statistics
//!
//! # Example
//!
//! ```no_run
//! use vkframes_app::{run_app, AppConfig, AppContext, FrameContext, FrameRecorder, SampleApp};
//!
//! struct MyApp;
//!
//! impl FrameRecorder for MyApp {
//!     fn record(&mut self, frame: &FrameContext) -> anyhow::Result<()> {
//!         // Record commands into frame.command_buffer and leave the
//!         // swapchain image in PRESENT_SRC_KHR.
//!         Ok(())
//!     }
//! }
//!
//! impl SampleApp for MyApp {
//!     fn init(_ctx: &AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod context;
mod error;
mod frame;
mod frame_loop;
mod runner;
mod stats;

pub use app::SampleApp;
pub use context::AppContext;
pub use error::{FrameError, Result};
pub use frame::{FrameContext, FrameRecorder};
pub use frame_loop::{FrameLoop, FrameLoopConfig, FrameOutcome};
pub use runner::{init_logging, run_app, AppConfig};
pub use stats::FrameStats;

// Re-export commonly used types for convenience
pub use vkframes_gpu::{GpuContext, SyncStrategy};
pub use winit::event::WindowEvent;
