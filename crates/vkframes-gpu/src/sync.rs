//! Synchronization primitives and per-frame-in-flight sync state.

use crate::error::{GpuError, Result};
use ash::vk;

/// Vulkan calls needed to create, wait on and destroy sync objects.
pub trait SyncDevice {
    /// Create a binary semaphore.
    fn create_semaphore(&self) -> Result<vk::Semaphore>;

    /// Create a timeline semaphore with the given initial value.
    fn create_timeline_semaphore(&self, initial_value: u64) -> Result<vk::Semaphore>;

    /// Create a fence, optionally already signaled.
    fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;

    /// Block until the fence is signaled.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()>;

    /// Reset a fence to the unsignaled state.
    fn reset_fence(&self, fence: vk::Fence) -> Result<()>;

    /// Block until the timeline semaphore reaches `value`.
    fn wait_for_timeline(&self, semaphore: vk::Semaphore, value: u64, timeout_ns: u64)
        -> Result<()>;

    /// # Safety
    /// The semaphore must not be in use.
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// # Safety
    /// The fence must not be in use.
    unsafe fn destroy_fence(&self, fence: vk::Fence);
}

impl SyncDevice for ash::Device {
    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        // SAFETY: The device is valid for as long as `self` exists.
        let semaphore = unsafe { ash::Device::create_semaphore(self, &create_info, None)? };
        Ok(semaphore)
    }

    fn create_timeline_semaphore(&self, initial_value: u64) -> Result<vk::Semaphore> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        // SAFETY: The device is valid and was created with timeline semaphores enabled.
        let semaphore = unsafe { ash::Device::create_semaphore(self, &create_info, None)? };
        Ok(semaphore)
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        // SAFETY: The device is valid for as long as `self` exists.
        let fence = unsafe { ash::Device::create_fence(self, &create_info, None)? };
        Ok(fence)
    }

    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        // SAFETY: The fence was created from this device.
        unsafe { self.wait_for_fences(&[fence], true, timeout_ns)? };
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        // SAFETY: The fence was created from this device and is not pending.
        unsafe { self.reset_fences(&[fence])? };
        Ok(())
    }

    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    fn wait_for_timeline(
        &self,
        semaphore: vk::Semaphore,
        value: u64,
        timeout_ns: u64,
    ) -> Result<()> {
        let semaphores = [semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        // SAFETY: The semaphore is a timeline semaphore created from this device.
        unsafe { self.wait_semaphores(&wait_info, timeout_ns)? };
        Ok(())
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        // SAFETY: Forwarded from the caller.
        unsafe { ash::Device::destroy_semaphore(self, semaphore, None) };
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        // SAFETY: Forwarded from the caller.
        unsafe { ash::Device::destroy_fence(self, fence, None) };
    }
}

/// How a frame slot tracks GPU completion of its last submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStrategy {
    /// One fence per slot.
    #[default]
    Fences,
    /// A single timeline semaphore; each slot remembers the value it last signaled.
    Timeline,
}

/// What the submit must signal to mark a slot complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSignal {
    Fence(vk::Fence),
    Timeline { semaphore: vk::Semaphore, value: u64 },
}

/// Handles of one frame slot, returned by [`FrameSyncPool::begin_frame`].
#[derive(Debug, Clone, Copy)]
pub struct SlotHandles {
    pub slot: usize,
    /// Signaled by acquire, waited on by the submit.
    pub image_available: vk::Semaphore,
    /// Signaled by the submit, waited on by present.
    pub render_finished: vk::Semaphore,
    pub completion: CompletionSignal,
}

/// Index of the frame slot being prepared, advanced modulo the slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
    len: usize,
}

impl FrameCursor {
    /// Create a cursor over `len` slots. `len` must be nonzero.
    pub fn new(len: usize) -> Self {
        Self { current: 0, len }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Advance to the next slot.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.len;
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[derive(Debug)]
struct FrameSlot {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    /// Null under the timeline strategy.
    fence: vk::Fence,
    /// Timeline value of the last submission from this slot.
    wait_value: u64,
    /// Fence reset (or timeline value reserved) but not yet submitted.
    armed: bool,
    /// `image_available` has a signal pending that no submit has consumed.
    acquired: bool,
    /// `render_finished` was signaled by a submit that present never waited on.
    present_pending: bool,
}

/// Synchronization for multiple frames in flight.
///
/// All objects are indexed by frame slot, never by swapchain image index.
/// Slots are created once and survive swapchain recreation.
///
/// A slot's `render_finished` semaphore is reused as soon as the slot's fence
/// (or timeline value) signals. That only proves the submit finished, not that
/// the present waiting on the semaphore has consumed it, and core Vulkan gives
/// no signal for the latter. The pool relies on presentation engines retiring
/// presents in order; without `VK_EXT_swapchain_maintenance1` present fences
/// the reuse can race, which validation reports as a semaphore still in use.
#[derive(Debug)]
pub struct FrameSyncPool {
    strategy: SyncStrategy,
    slots: Vec<FrameSlot>,
    timeline: vk::Semaphore,
    /// Last value signaled on the timeline.
    timeline_value: u64,
    cursor: FrameCursor,
}

impl FrameSyncPool {
    /// Create sync objects for `frames_in_flight` slots.
    ///
    /// Fences start signaled so the first wait on each slot returns at once.
    pub fn new<D: SyncDevice + ?Sized>(
        device: &D,
        frames_in_flight: usize,
        strategy: SyncStrategy,
    ) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(GpuError::InvalidState(
                "frames in flight must be at least 1".to_string(),
            ));
        }

        let mut pool = Self {
            strategy,
            slots: Vec::with_capacity(frames_in_flight),
            timeline: vk::Semaphore::null(),
            timeline_value: 0,
            cursor: FrameCursor::new(frames_in_flight),
        };

        if let Err(e) = pool.populate(device, frames_in_flight) {
            // SAFETY: Nothing created so far has been used.
            unsafe { pool.destroy(device) };
            return Err(e);
        }

        tracing::debug!(
            "Created frame sync pool: {} slots, {:?}",
            frames_in_flight,
            strategy
        );
        Ok(pool)
    }

    fn populate<D: SyncDevice + ?Sized>(&mut self, device: &D, count: usize) -> Result<()> {
        if self.strategy == SyncStrategy::Timeline {
            self.timeline = device.create_timeline_semaphore(0)?;
        }

        for _ in 0..count {
            let image_available = device.create_semaphore()?;
            let render_finished = match device.create_semaphore() {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    // SAFETY: Just created, never used.
                    unsafe { device.destroy_semaphore(image_available) };
                    return Err(e);
                }
            };
            let fence = match self.strategy {
                SyncStrategy::Fences => match device.create_fence(true) {
                    Ok(fence) => fence,
                    Err(e) => {
                        // SAFETY: Just created, never used.
                        unsafe {
                            device.destroy_semaphore(image_available);
                            device.destroy_semaphore(render_finished);
                        }
                        return Err(e);
                    }
                },
                SyncStrategy::Timeline => vk::Fence::null(),
            };
            self.slots.push(FrameSlot {
                image_available,
                render_finished,
                fence,
                wait_value: 0,
                armed: false,
                acquired: false,
                present_pending: false,
            });
        }
        Ok(())
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Slot the next frame uses.
    pub fn current_slot(&self) -> usize {
        self.cursor.current()
    }

    /// Move to the next slot after a frame was presented.
    pub fn advance(&mut self) {
        self.cursor.advance();
    }

    /// Restart at slot 0 (after a swapchain recreate).
    pub fn reset_cursor(&mut self) {
        self.cursor.reset();
    }

    /// Last value signaled on the timeline semaphore (always 0 for fences).
    pub fn timeline_value(&self) -> u64 {
        self.timeline_value
    }

    fn slot(&self, slot: usize) -> Result<&FrameSlot> {
        self.slots.get(slot).ok_or_else(|| {
            GpuError::InvalidState(format!(
                "frame slot {slot} out of range ({} slots)",
                self.slots.len()
            ))
        })
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut FrameSlot> {
        let len = self.slots.len();
        self.slots.get_mut(slot).ok_or_else(|| {
            GpuError::InvalidState(format!("frame slot {slot} out of range ({len} slots)"))
        })
    }

    /// Wait until the previous submission from `slot` finished on the GPU.
    ///
    /// The fence is left signaled; [`arm`](Self::arm) resets it right before
    /// the submit.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn begin_frame<D: SyncDevice + ?Sized>(
        &self,
        device: &D,
        slot: usize,
    ) -> Result<SlotHandles> {
        let state = self.slot(slot)?;
        let completion = match self.strategy {
            SyncStrategy::Fences => {
                device.wait_for_fence(state.fence, u64::MAX)?;
                CompletionSignal::Fence(state.fence)
            }
            SyncStrategy::Timeline => {
                if state.wait_value > 0 {
                    device.wait_for_timeline(self.timeline, state.wait_value, u64::MAX)?;
                }
                CompletionSignal::Timeline {
                    semaphore: self.timeline,
                    value: self.timeline_value + 1,
                }
            }
        };

        Ok(SlotHandles {
            slot,
            image_available: state.image_available,
            render_finished: state.render_finished,
            completion,
        })
    }

    /// Record that acquire signaled the slot's `image_available` semaphore.
    pub fn note_acquired(&mut self, slot: usize) -> Result<()> {
        self.slot_mut(slot)?.acquired = true;
        Ok(())
    }

    /// Prepare the slot's completion marker for the submit.
    ///
    /// Only call this once the image is acquired and the commands are recorded.
    pub fn arm<D: SyncDevice + ?Sized>(&mut self, device: &D, slot: usize) -> Result<()> {
        let strategy = self.strategy;
        let state = self.slot_mut(slot)?;
        if strategy == SyncStrategy::Fences {
            device.reset_fence(state.fence)?;
        }
        state.armed = true;
        Ok(())
    }

    /// Commit the slot's submission after a successful submit.
    pub fn end_frame(&mut self, slot: usize) -> Result<()> {
        let strategy = self.strategy;
        let next_value = self.timeline_value + 1;
        let state = self.slot_mut(slot)?;
        if !state.armed {
            return Err(GpuError::InvalidState(format!(
                "frame slot {slot} ended without being armed"
            )));
        }
        state.armed = false;
        state.acquired = false;
        state.present_pending = true;
        if strategy == SyncStrategy::Timeline {
            state.wait_value = next_value;
            self.timeline_value = next_value;
        }
        Ok(())
    }

    /// Record that present consumed the slot's `render_finished` semaphore.
    pub fn note_presented(&mut self, slot: usize) -> Result<()> {
        self.slot_mut(slot)?.present_pending = false;
        Ok(())
    }

    /// Wait for every slot's last submission.
    pub fn wait_all<D: SyncDevice + ?Sized>(&self, device: &D) -> Result<()> {
        for state in &self.slots {
            match self.strategy {
                SyncStrategy::Fences if !state.armed => {
                    device.wait_for_fence(state.fence, u64::MAX)?;
                }
                SyncStrategy::Timeline if state.wait_value > 0 => {
                    device.wait_for_timeline(self.timeline, state.wait_value, u64::MAX)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Repair slots left unusable by an abandoned frame.
    ///
    /// A fence reset without a submit would never signal again and is replaced
    /// by a new signaled fence. An `image_available` semaphore whose signal was
    /// never waited on is replaced by a fresh one, and so is a
    /// `render_finished` semaphore whose present never happened.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn recover<D: SyncDevice + ?Sized>(&mut self, device: &D) -> Result<()> {
        let strategy = self.strategy;
        for (index, state) in self.slots.iter_mut().enumerate() {
            if state.armed && strategy == SyncStrategy::Fences {
                let fence = device.create_fence(true)?;
                // SAFETY: Device is idle and the fence has no pending submission.
                unsafe { device.destroy_fence(state.fence) };
                state.fence = fence;
                tracing::debug!("Replaced unsubmitted fence of frame slot {index}");
            }
            if state.acquired {
                let semaphore = device.create_semaphore()?;
                // SAFETY: Device is idle; the pending signal is discarded with the object.
                unsafe { device.destroy_semaphore(state.image_available) };
                state.image_available = semaphore;
                tracing::debug!("Replaced signaled image semaphore of frame slot {index}");
            }
            if state.present_pending {
                let semaphore = device.create_semaphore()?;
                // SAFETY: Device is idle; the pending signal is discarded with the object.
                unsafe { device.destroy_semaphore(state.render_finished) };
                state.render_finished = semaphore;
                tracing::debug!("Replaced unpresented render semaphore of frame slot {index}");
            }
            state.armed = false;
            state.acquired = false;
            state.present_pending = false;
        }
        Ok(())
    }

    /// Destroy all sync objects.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy<D: SyncDevice + ?Sized>(&mut self, device: &D) {
        // SAFETY: Forwarded from the caller.
        unsafe {
            for state in self.slots.drain(..) {
                device.destroy_semaphore(state.image_available);
                device.destroy_semaphore(state.render_finished);
                if state.fence != vk::Fence::null() {
                    device.destroy_fence(state.fence);
                }
            }
            if self.timeline != vk::Semaphore::null() {
                device.destroy_semaphore(self.timeline);
                self.timeline = vk::Semaphore::null();
            }
        }
    }
}
