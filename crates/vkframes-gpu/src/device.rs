//! The device seam the frame loop is written against.

use crate::command::CommandDevice;
use crate::swapchain::SwapchainDevice;
use crate::sync::SyncDevice;

/// Everything the frame loop needs from a device: swapchain, sync and command calls.
///
/// Blanket-implemented for any type providing all three.
pub trait FrameDevice: SwapchainDevice + SyncDevice + CommandDevice {}

impl<T: SwapchainDevice + SyncDevice + CommandDevice + ?Sized> FrameDevice for T {}
