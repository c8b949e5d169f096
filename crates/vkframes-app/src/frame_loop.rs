//! The per-frame state machine.
//!
//! Each call to [`FrameLoop::run_once`] does one of four things: presents a
//! frame, rebuilds the swapchain, drops a frame after a recoverable failure,
//! or skips because the window is closing. Rebuilds and the frame body run
//! behind one error boundary: transient presentation errors and recorder errors are
//! absorbed there by waiting for the device, repairing the sync slots and
//! recreating the swapchain. Everything else propagates.

use crate::error::{FrameError, Result};
use crate::frame::{FrameContext, FrameRecorder};
use ash::vk;
use tracing::{debug, warn};
use vkframes_gpu::{
    AcquireOutcome, FrameDevice, FrameSubmit, FrameSyncPool, GpuError, Swapchain,
    SwapchainConfig, SwapchainLifecycle, SyncStrategy,
};
use vkframes_platform::WindowSurface;

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and queued for presentation.
    Presented {
        image_index: u32,
        slot: usize,
        /// The swapchain will be recreated before the next frame.
        suboptimal: bool,
    },
    /// The swapchain was rebuilt; nothing was rendered.
    Recreated,
    /// The frame was abandoned after a recoverable error.
    Dropped,
    /// The window is closing; nothing was done.
    Skipped,
}

/// Frame loop settings.
#[derive(Debug, Clone, Copy)]
pub struct FrameLoopConfig {
    pub frames_in_flight: usize,
    pub sync_strategy: SyncStrategy,
    pub swapchain: SwapchainConfig,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            sync_strategy: SyncStrategy::Fences,
            swapchain: SwapchainConfig::default(),
        }
    }
}

/// Drives acquire, record, submit and present over a [`FrameDevice`].
pub struct FrameLoop<B: FrameDevice> {
    device: B,
    swapchain: SwapchainLifecycle,
    sync: FrameSyncPool,
    /// One per frame slot.
    command_buffers: Vec<vk::CommandBuffer>,
    resize_pending: bool,
    frame_number: u64,
}

impl<B: FrameDevice> FrameLoop<B> {
    /// Create the swapchain, the frame slots and their command buffers.
    ///
    /// `extent` is the window's framebuffer size and must be nonzero.
    pub fn new(device: B, extent: vk::Extent2D, config: FrameLoopConfig) -> Result<Self> {
        let swapchain = SwapchainLifecycle::create(&device, extent, config.swapchain, Vec::new())?;

        let mut sync =
            match FrameSyncPool::new(&device, config.frames_in_flight, config.sync_strategy) {
                Ok(sync) => sync,
                Err(e) => {
                    // SAFETY: The swapchain was never used.
                    unsafe { swapchain.destroy(&device) };
                    return Err(e.into());
                }
            };

        let allocated = u32::try_from(config.frames_in_flight)
            .map_err(|_| GpuError::InvalidState("too many frames in flight".to_string()))
            .and_then(|count| device.allocate_frame_command_buffers(count));
        let command_buffers = match allocated {
            Ok(buffers) => buffers,
            Err(e) => {
                // SAFETY: Nothing was submitted yet.
                unsafe {
                    sync.destroy(&device);
                    swapchain.destroy(&device);
                }
                return Err(e.into());
            }
        };

        debug!(
            "Frame loop ready: {} frames in flight, {:?}",
            config.frames_in_flight, config.sync_strategy
        );

        Ok(Self {
            device,
            swapchain,
            sync,
            command_buffers,
            resize_pending: false,
            frame_number: 0,
        })
    }

    /// The device the loop renders with.
    pub fn device(&self) -> &B {
        &self.device
    }

    /// The current swapchain.
    pub fn swapchain(&self) -> &Swapchain {
        self.swapchain.current()
    }

    pub fn sync(&self) -> &FrameSyncPool {
        &self.sync
    }

    /// Frames presented so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Whether the next iteration rebuilds the swapchain.
    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Force a swapchain rebuild on the next iteration.
    pub fn request_recreate(&mut self) {
        self.resize_pending = true;
    }

    /// Switch present mode. Takes effect through a recreate on the next iteration.
    pub fn set_preferred_present_mode(&mut self, mode: vk::PresentModeKHR) {
        debug!("Preferred present mode set to {mode:?}");
        self.swapchain.set_preferred_present_mode(mode);
        self.resize_pending = true;
    }

    /// Run one iteration of the loop.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn run_once<W, R>(&mut self, window: &mut W, recorder: &mut R) -> Result<FrameOutcome>
    where
        W: WindowSurface + ?Sized,
        R: FrameRecorder + ?Sized,
    {
        window.poll_events();
        if window.should_close() {
            return Ok(FrameOutcome::Skipped);
        }
        if window.take_resized() {
            self.resize_pending = true;
        }

        let (width, height) = window.framebuffer_size();
        let result = if self.resize_pending || width == 0 || height == 0 {
            self.recreate(window, recorder)
        } else {
            self.render_frame(window, recorder)
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_recoverable() => {
                match &e {
                    FrameError::Recorder(_) => warn!("Dropping frame {}: {e}", self.frame_number),
                    FrameError::Gpu(_) => debug!("Dropping frame {}: {e}", self.frame_number),
                }
                self.device.wait_idle()?;
                // SAFETY: The device is idle.
                unsafe { self.sync.recover(&self.device)? };
                self.resize_pending = true;
                match self.recreate(window, recorder) {
                    Ok(_) => {}
                    // Still pending; the next iteration retries.
                    Err(e) if e.is_recoverable() => warn!("Swapchain rebuild failed again: {e}"),
                    Err(e) => return Err(e),
                }
                Ok(FrameOutcome::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    fn render_frame<W, R>(&mut self, window: &mut W, recorder: &mut R) -> Result<FrameOutcome>
    where
        W: WindowSurface + ?Sized,
        R: FrameRecorder + ?Sized,
    {
        let slot = self.sync.current_slot();
        let handles = self.sync.begin_frame(&self.device, slot)?;

        let swapchain = self.swapchain.current();
        let (image_index, acquire_suboptimal) =
            match swapchain.acquire_next_image(&self.device, handles.image_available, u64::MAX)? {
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                } => (image_index, suboptimal),
                AcquireOutcome::OutOfDate => {
                    debug!("Swapchain out of date on acquire");
                    self.resize_pending = true;
                    return self.recreate(window, recorder);
                }
            };
        self.sync.note_acquired(slot)?;

        let image = image_index as usize;
        let frame = FrameContext {
            command_buffer: self.command_buffers[slot],
            image_index,
            swapchain_image: swapchain.images()[image],
            swapchain_view: swapchain.image_views()[image],
            extent: swapchain.extent(),
            format: swapchain.format(),
            slot,
            frame_number: self.frame_number,
        };

        self.device.begin_frame_commands(frame.command_buffer)?;
        recorder.record(&frame).map_err(FrameError::Recorder)?;
        self.device.end_frame_commands(frame.command_buffer)?;

        self.sync.arm(&self.device, slot)?;
        self.device.submit_frame(&FrameSubmit {
            command_buffer: frame.command_buffer,
            wait_semaphore: handles.image_available,
            wait_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: handles.render_finished,
            completion: handles.completion,
        })?;
        self.sync.end_frame(slot)?;

        let presented =
            self.swapchain
                .current()
                .present(&self.device, image_index, &[handles.render_finished])?;
        self.sync.note_presented(slot)?;

        let suboptimal = acquire_suboptimal || presented.needs_recreate();
        if suboptimal {
            debug!("Swapchain suboptimal ({presented:?}), recreating next frame");
            self.resize_pending = true;
        }

        self.sync.advance();
        self.frame_number += 1;

        Ok(FrameOutcome::Presented {
            image_index,
            slot,
            suboptimal,
        })
    }

    /// Wait for a nonzero framebuffer, then rebuild the swapchain.
    fn recreate<W, R>(&mut self, window: &mut W, recorder: &mut R) -> Result<FrameOutcome>
    where
        W: WindowSurface + ?Sized,
        R: FrameRecorder + ?Sized,
    {
        let (width, height) = loop {
            let (width, height) = window.framebuffer_size();
            if width > 0 && height > 0 {
                break (width, height);
            }
            if window.should_close() {
                return Ok(FrameOutcome::Skipped);
            }
            window.wait_events();
        };

        self.device.wait_idle()?;

        let extent = vk::Extent2D { width, height };
        // SAFETY: The device is idle.
        match unsafe { self.swapchain.recreate(&self.device, extent) } {
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                // The surface may still report a stale zero extent; retry next iteration.
                debug!("Swapchain recreation deferred: {e}");
                self.resize_pending = true;
                return Ok(FrameOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        self.sync.reset_cursor();

        recorder
            .on_swapchain_recreated(self.swapchain.current())
            .map_err(FrameError::Recorder)?;
        self.resize_pending = false;

        Ok(FrameOutcome::Recreated)
    }

    /// Wait for the device, then destroy views, swapchain, sync objects and
    /// command buffers. Returns the device for its owner to release.
    pub fn shutdown(self) -> B {
        let Self {
            device,
            swapchain,
            mut sync,
            command_buffers,
            ..
        } = self;

        if let Err(e) = device.wait_idle() {
            tracing::error!("Failed to wait for device idle during shutdown: {e}");
        }

        // SAFETY: The device is idle.
        unsafe {
            swapchain.destroy(&device);
            sync.destroy(&device);
            device.free_frame_command_buffers(&command_buffers);
        }

        debug!("Frame loop shut down");
        device
    }
}
