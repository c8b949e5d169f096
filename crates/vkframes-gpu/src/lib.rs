//! Vulkan layer for the vkframes samples.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - GPU capability detection
//! - Image allocation via gpu-allocator
//! - Swapchain lifecycle (negotiation, creation, recreation, acquire, present)
//! - Per-frame-in-flight synchronization with fences or a timeline semaphore
//! - Frame command buffer submission with synchronization2
//! - The device traits the frame loop is written against

pub mod capabilities;
pub mod command;
pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod memory;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::{CommandDevice, CommandPool, FrameSubmit};
pub use context::{GpuContext, GpuContextBuilder};
pub use device::FrameDevice;
pub use error::{ErrorKind, GpuError, Result};
pub use memory::{GpuAllocator, GpuImage};
pub use surface::SurfaceContext;
pub use swapchain::{
    AcquireOutcome, PresentOutcome, SurfaceSupport, Swapchain, SwapchainConfig,
    SwapchainDevice, SwapchainLifecycle, SwapchainPlan,
};
pub use sync::{
    CompletionSignal, FrameCursor, FrameSyncPool, SlotHandles, SyncDevice, SyncStrategy,
};
