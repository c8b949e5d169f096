//! Command buffer management and frame submission.

use crate::error::Result;
use crate::sync::CompletionSignal;
use ash::vk;

/// One frame's queue submission.
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmit {
    pub command_buffer: vk::CommandBuffer,
    /// Binary semaphore signaled by acquire.
    pub wait_semaphore: vk::Semaphore,
    /// Stage that waits on `wait_semaphore`.
    pub wait_stage: vk::PipelineStageFlags2,
    /// Binary semaphore present waits on.
    pub signal_semaphore: vk::Semaphore,
    pub completion: CompletionSignal,
}

/// Vulkan calls needed to record and submit frame command buffers.
pub trait CommandDevice {
    /// Allocate `count` primary command buffers, one per frame slot.
    fn allocate_frame_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>>;

    /// Reset a command buffer and begin one-time-submit recording.
    fn begin_frame_commands(&self, command_buffer: vk::CommandBuffer) -> Result<()>;

    /// End recording.
    fn end_frame_commands(&self, command_buffer: vk::CommandBuffer) -> Result<()>;

    /// Submit a frame to the graphics queue.
    fn submit_frame(&self, submit: &FrameSubmit) -> Result<()>;

    /// Wait until the device is idle.
    fn wait_idle(&self) -> Result<()>;

    /// # Safety
    /// The command buffers must not be pending execution.
    unsafe fn free_frame_command_buffers(&self, command_buffers: &[vk::CommandBuffer]);
}

/// Command pool for allocating command buffers.
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Create a new command pool.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(
        device: &ash::Device,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(flags);

        // SAFETY: Forwarded from the caller.
        let pool = unsafe { device.create_command_pool(&create_info, None)? };

        Ok(Self { pool, queue_family })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate primary command buffers.
    ///
    /// # Safety
    /// The device must be the one the pool was created from.
    pub unsafe fn allocate_command_buffers(
        &self,
        device: &ash::Device,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        // SAFETY: Forwarded from the caller.
        let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };
        Ok(buffers)
    }

    /// Free command buffers allocated from this pool.
    ///
    /// # Safety
    /// The command buffers must not be pending execution.
    pub unsafe fn free_command_buffers(
        &self,
        device: &ash::Device,
        command_buffers: &[vk::CommandBuffer],
    ) {
        if command_buffers.is_empty() {
            return;
        }
        // SAFETY: Forwarded from the caller.
        unsafe { device.free_command_buffers(self.pool, command_buffers) };
    }

    /// Destroy the command pool.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        // SAFETY: Forwarded from the caller.
        unsafe { device.destroy_command_pool(self.pool, None) };
    }
}

/// Reset a command buffer and begin recording it for a single submission.
///
/// # Safety
/// The command buffer must come from a pool created with
/// `RESET_COMMAND_BUFFER` and must not be pending execution.
pub unsafe fn begin_one_time_commands(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    let begin_info =
        vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    // SAFETY: Forwarded from the caller.
    unsafe {
        device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        device.begin_command_buffer(cmd, &begin_info)?;
    }
    Ok(())
}

/// End recording a command buffer.
///
/// # Safety
/// The command buffer must be in the recording state.
pub unsafe fn end_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    // SAFETY: Forwarded from the caller.
    unsafe { device.end_command_buffer(cmd)? };
    Ok(())
}

/// Submit a frame with synchronization2.
///
/// Waits on the acquire semaphore at `submit.wait_stage`, signals the
/// present semaphore at `ALL_COMMANDS` and the completion marker: the fence,
/// or the timeline semaphore at the reserved value.
///
/// # Safety
/// All handles must be valid and the fence, if any, must be unsignaled.
#[cfg_attr(
    feature = "profiling-tracy",
    tracing::instrument(level = "trace", skip_all)
)]
pub unsafe fn submit_frame(
    device: &ash::Device,
    queue: vk::Queue,
    submit: &FrameSubmit,
) -> Result<()> {
    let wait_infos = [vk::SemaphoreSubmitInfo::default()
        .semaphore(submit.wait_semaphore)
        .stage_mask(submit.wait_stage)];

    let mut signal_infos = vec![vk::SemaphoreSubmitInfo::default()
        .semaphore(submit.signal_semaphore)
        .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];

    let fence = match submit.completion {
        CompletionSignal::Fence(fence) => fence,
        CompletionSignal::Timeline { semaphore, value } => {
            signal_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .value(value)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
            vk::Fence::null()
        }
    };

    let command_buffer_infos =
        [vk::CommandBufferSubmitInfo::default().command_buffer(submit.command_buffer)];

    let submit_info = vk::SubmitInfo2::default()
        .wait_semaphore_infos(&wait_infos)
        .command_buffer_infos(&command_buffer_infos)
        .signal_semaphore_infos(&signal_infos);

    // SAFETY: Forwarded from the caller.
    unsafe { device.queue_submit2(queue, &[submit_info], fence)? };
    Ok(())
}
