//! In-memory device, window and recorder for exercising the frame loop.
//!
//! [`MockDevice`] implements the device traits without a GPU. It hands out
//! fake handles, keeps count of live objects and tracks the state of every
//! semaphore and fence, recording a violation whenever the loop uses one in a
//! way a real driver would reject or deadlock on.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use ash::vk::{self, Handle};
use parking_lot::{Condvar, Mutex};
use vkframes_app::{FrameContext, FrameRecorder};
use vkframes_gpu::{
    AcquireOutcome, CommandDevice, CompletionSignal, FrameSubmit, GpuError, PresentOutcome,
    Result, SurfaceSupport, Swapchain, SwapchainDevice, SyncDevice,
};
use vkframes_platform::WindowSurface;

/// How long a wait may block before the mock reports a deadlock.
const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Scripted result for a numbered acquire call.
#[derive(Debug, Clone, Copy)]
pub enum AcquireScript {
    OutOfDate,
    Suboptimal,
    Error(vk::Result),
}

/// Scripted result for a numbered present call.
#[derive(Debug, Clone, Copy)]
pub enum PresentScript {
    Suboptimal,
    OutOfDate,
    /// The present fails; its wait semaphore is left signaled.
    Error(vk::Result),
}

/// Default surface: 2..unbounded images, free extent, sRGB BGRA, FIFO/MAILBOX/IMMEDIATE.
pub fn default_support() -> SurfaceSupport {
    SurfaceSupport {
        capabilities: vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            max_image_array_layers: 1,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_DST,
        },
        formats: vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }],
        present_modes: vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ],
    }
}

#[derive(Debug)]
struct SwapchainRecord {
    ordinal: u64,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    images: Vec<vk::Image>,
    next_image: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    /// Submitted, signals when the submission completes.
    Pending,
}

#[derive(Debug, Default)]
struct Submission {
    fence: Option<vk::Fence>,
    timeline: Option<(vk::Semaphore, u64)>,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: u64,
    support: SurfaceSupport,

    swapchains: HashMap<u64, SwapchainRecord>,
    swapchains_created: u64,
    live_views: HashSet<u64>,
    views_created: u64,

    /// Binary semaphores: raw handle to signaled.
    semaphores: HashMap<u64, bool>,
    semaphores_created: u64,
    /// Timeline semaphores: raw handle to current value.
    timelines: HashMap<u64, u64>,
    fences: HashMap<u64, FenceState>,
    command_buffers: HashSet<u64>,

    auto_complete: bool,
    pending: VecDeque<Submission>,

    acquire_calls: u64,
    present_calls: u64,
    submit_calls: u64,
    view_calls: u64,
    acquire_script: HashMap<u64, AcquireScript>,
    present_script: HashMap<u64, PresentScript>,
    submit_failures: HashMap<u64, vk::Result>,
    view_failures: HashSet<u64>,

    fence_resets: u64,
    wait_idles: u64,
    timeline_signals: Vec<u64>,
    timeline_waits: Vec<u64>,

    trace: Vec<String>,
    violations: Vec<String>,
}

impl MockState {
    fn next<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(self.next_handle)
    }

    fn swapchain_label(&self, swapchain: vk::SwapchainKHR) -> String {
        self.swapchains
            .get(&swapchain.as_raw())
            .map_or_else(|| "#?".to_string(), |record| format!("#{}", record.ordinal))
    }

    fn complete_all(&mut self) {
        while let Some(submission) = self.pending.pop_front() {
            self.complete(submission);
        }
    }

    fn complete(&mut self, submission: Submission) {
        if let Some(fence) = submission.fence {
            self.fences.insert(fence.as_raw(), FenceState::Signaled);
        }
        if let Some((semaphore, value)) = submission.timeline {
            if let Some(current) = self.timelines.get_mut(&semaphore.as_raw()) {
                *current = (*current).max(value);
            }
        }
    }
}

/// Device double implementing [`SwapchainDevice`], [`SyncDevice`] and [`CommandDevice`].
pub struct MockDevice {
    state: Mutex<MockState>,
    progress: Condvar,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new(default_support())
    }
}

impl MockDevice {
    /// Create a device whose surface reports `support`.
    pub fn new(support: SurfaceSupport) -> Self {
        Self {
            state: Mutex::new(MockState {
                support,
                auto_complete: true,
                ..Default::default()
            }),
            progress: Condvar::new(),
        }
    }

    /// Replace what the surface reports from now on.
    pub fn set_support(&self, support: SurfaceSupport) {
        self.state.lock().support = support;
    }

    /// Whether submissions complete as soon as they are made (default `true`).
    pub fn set_auto_complete(&self, auto_complete: bool) {
        self.state.lock().auto_complete = auto_complete;
    }

    /// Complete every pending submission, waking blocked waiters.
    pub fn complete_submissions(&self) {
        self.state.lock().complete_all();
        self.progress.notify_all();
    }

    /// Script the `call`-th acquire (1-based).
    pub fn script_acquire(&self, call: u64, script: AcquireScript) {
        self.state.lock().acquire_script.insert(call, script);
    }

    /// Script the `call`-th present (1-based).
    pub fn script_present(&self, call: u64, script: PresentScript) {
        self.state.lock().present_script.insert(call, script);
    }

    /// Fail the `call`-th submit (1-based).
    pub fn fail_submit(&self, call: u64, error: vk::Result) {
        self.state.lock().submit_failures.insert(call, error);
    }

    /// Fail the `call`-th image view creation (1-based).
    pub fn fail_image_view(&self, call: u64) {
        self.state.lock().view_failures.insert(call);
    }

    pub fn live_swapchains(&self) -> usize {
        self.state.lock().swapchains.len()
    }

    pub fn swapchains_created(&self) -> u64 {
        self.state.lock().swapchains_created
    }

    /// Extent and present mode of the newest live swapchain.
    pub fn latest_swapchain(&self) -> Option<(vk::Extent2D, vk::PresentModeKHR)> {
        self.state
            .lock()
            .swapchains
            .values()
            .max_by_key(|record| record.ordinal)
            .map(|record| (record.extent, record.present_mode))
    }

    pub fn live_image_views(&self) -> usize {
        self.state.lock().live_views.len()
    }

    /// Binary and timeline semaphores alive.
    pub fn live_semaphores(&self) -> usize {
        let state = self.state.lock();
        state.semaphores.len() + state.timelines.len()
    }

    pub fn semaphores_created(&self) -> u64 {
        self.state.lock().semaphores_created
    }

    pub fn live_fences(&self) -> usize {
        self.state.lock().fences.len()
    }

    pub fn live_command_buffers(&self) -> usize {
        self.state.lock().command_buffers.len()
    }

    pub fn acquire_calls(&self) -> u64 {
        self.state.lock().acquire_calls
    }

    pub fn submit_calls(&self) -> u64 {
        self.state.lock().submit_calls
    }

    pub fn present_calls(&self) -> u64 {
        self.state.lock().present_calls
    }

    pub fn fence_resets(&self) -> u64 {
        self.state.lock().fence_resets
    }

    pub fn wait_idles(&self) -> u64 {
        self.state.lock().wait_idles
    }

    /// Values signaled on timeline semaphores, in submission order.
    pub fn timeline_signals(&self) -> Vec<u64> {
        self.state.lock().timeline_signals.clone()
    }

    /// Values CPU waits on timeline semaphores asked for, in order.
    pub fn timeline_waits(&self) -> Vec<u64> {
        self.state.lock().timeline_waits.clone()
    }

    /// Whether `fence` is currently signaled.
    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state.lock().fences.get(&fence.as_raw()) == Some(&FenceState::Signaled)
    }

    /// Calls that change presentation state, one line each.
    pub fn trace(&self) -> Vec<String> {
        self.state.lock().trace.clone()
    }

    pub fn clear_trace(&self) {
        self.state.lock().trace.clear();
    }

    /// Misuse a real driver would reject or deadlock on.
    pub fn violations(&self) -> Vec<String> {
        self.state.lock().violations.clone()
    }

    fn wait_until<F>(&self, what: &str, mut ready: F) -> Result<()>
    where
        F: FnMut(&MockState) -> bool,
    {
        let mut state = self.state.lock();
        while !ready(&*state) {
            if self.progress.wait_for(&mut state, DEADLOCK_TIMEOUT).timed_out() && !ready(&*state) {
                state.violations.push(format!("deadlock waiting for {what}"));
                return Err(GpuError::Vulkan(vk::Result::TIMEOUT));
            }
        }
        Ok(())
    }
}

impl SwapchainDevice for MockDevice {
    fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0xFACE)
    }

    fn surface_support(&self) -> Result<SurfaceSupport> {
        Ok(self.state.lock().support.clone())
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> Result<vk::SwapchainKHR> {
        let mut state = self.state.lock();
        let old = if info.old_swapchain == vk::SwapchainKHR::null() {
            String::new()
        } else {
            if !state.swapchains.contains_key(&info.old_swapchain.as_raw()) {
                state
                    .violations
                    .push("old swapchain passed after destruction".to_string());
            }
            format!(" old={}", state.swapchain_label(info.old_swapchain))
        };

        let swapchain: vk::SwapchainKHR = state.next();
        let images = (0..info.min_image_count)
            .map(|_| state.next())
            .collect::<Vec<vk::Image>>();

        state.swapchains_created += 1;
        let ordinal = state.swapchains_created;
        state.trace.push(format!(
            "create_swapchain #{ordinal} {}x{}{old}",
            info.image_extent.width, info.image_extent.height
        ));
        state.swapchains.insert(
            swapchain.as_raw(),
            SwapchainRecord {
                ordinal,
                extent: info.image_extent,
                present_mode: info.present_mode,
                images,
                next_image: 0,
            },
        );
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        self.state
            .lock()
            .swapchains
            .get(&swapchain.as_raw())
            .map(|record| record.images.clone())
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView> {
        let mut state = self.state.lock();
        state.view_calls += 1;
        if state.view_failures.contains(&state.view_calls) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        let view: vk::ImageView = state.next();
        state.live_views.insert(view.as_raw());
        state.views_created += 1;
        Ok(view)
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        let mut state = self.state.lock();
        state.acquire_calls += 1;
        let call = state.acquire_calls;
        let label = state.swapchain_label(swapchain);

        if state.semaphores.get(&semaphore.as_raw()) != Some(&false) {
            state
                .violations
                .push(format!("acquire {call} with a signaled or unknown semaphore"));
        }

        let script = state.acquire_script.remove(&call);
        match script {
            Some(AcquireScript::OutOfDate) => {
                state.trace.push(format!("acquire {label} -> out of date"));
                return Ok(AcquireOutcome::OutOfDate);
            }
            Some(AcquireScript::Error(e)) => {
                state.trace.push(format!("acquire {label} -> {e:?}"));
                return Err(GpuError::Vulkan(e));
            }
            Some(AcquireScript::Suboptimal) | None => {}
        }

        let Some(record) = state.swapchains.get_mut(&swapchain.as_raw()) else {
            state.violations.push(format!("acquire {call} on a dead swapchain"));
            return Err(GpuError::Vulkan(vk::Result::ERROR_SURFACE_LOST_KHR));
        };
        let image_index = record.next_image;
        record.next_image = (record.next_image + 1) % record.images.len() as u32;

        state.semaphores.insert(semaphore.as_raw(), true);
        let suboptimal = matches!(script, Some(AcquireScript::Suboptimal));
        state.trace.push(format!(
            "acquire {label} -> image {image_index}{}",
            if suboptimal { " (suboptimal)" } else { "" }
        ));
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        })
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<PresentOutcome> {
        let mut state = self.state.lock();
        state.present_calls += 1;
        let call = state.present_calls;
        let label = state.swapchain_label(swapchain);

        let outcome = match state.present_script.remove(&call) {
            Some(PresentScript::Error(e)) => {
                state
                    .trace
                    .push(format!("present {label} image {image_index} -> {e:?}"));
                return Err(GpuError::Vulkan(e));
            }
            Some(PresentScript::Suboptimal) => PresentOutcome::Suboptimal,
            Some(PresentScript::OutOfDate) => PresentOutcome::OutOfDate,
            None => PresentOutcome::Presented,
        };

        for semaphore in wait_semaphores {
            if state.semaphores.insert(semaphore.as_raw(), false) != Some(true) {
                state
                    .violations
                    .push(format!("present {call} waits on an unsignaled semaphore"));
            }
        }

        let result = match outcome {
            PresentOutcome::Presented => "presented",
            PresentOutcome::Suboptimal => "suboptimal",
            PresentOutcome::OutOfDate => "out of date",
        };
        state
            .trace
            .push(format!("present {label} image {image_index} -> {result}"));
        Ok(outcome)
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        let mut state = self.state.lock();
        if !state.live_views.remove(&view.as_raw()) {
            state.violations.push("image view destroyed twice".to_string());
        }
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state.lock();
        let label = state.swapchain_label(swapchain);
        if state.swapchains.remove(&swapchain.as_raw()).is_none() {
            state.violations.push("swapchain destroyed twice".to_string());
        }
        state.trace.push(format!("destroy_swapchain {label}"));
    }
}

impl SyncDevice for MockDevice {
    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let mut state = self.state.lock();
        let semaphore: vk::Semaphore = state.next();
        state.semaphores.insert(semaphore.as_raw(), false);
        state.semaphores_created += 1;
        Ok(semaphore)
    }

    fn create_timeline_semaphore(&self, initial_value: u64) -> Result<vk::Semaphore> {
        let mut state = self.state.lock();
        let semaphore: vk::Semaphore = state.next();
        state.timelines.insert(semaphore.as_raw(), initial_value);
        Ok(semaphore)
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let mut state = self.state.lock();
        let fence: vk::Fence = state.next();
        let fence_state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        state.fences.insert(fence.as_raw(), fence_state);
        Ok(fence)
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> Result<()> {
        let raw = fence.as_raw();
        self.wait_until("fence", |state| {
            state.fences.get(&raw) != Some(&FenceState::Pending)
                && state.fences.get(&raw) != Some(&FenceState::Unsignaled)
        })
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        let mut state = self.state.lock();
        state.fence_resets += 1;
        match state.fences.insert(fence.as_raw(), FenceState::Unsignaled) {
            Some(FenceState::Pending) => state
                .violations
                .push("reset of a fence with a pending submission".to_string()),
            None => state.violations.push("reset of an unknown fence".to_string()),
            _ => {}
        }
        state.trace.push("reset_fence".to_string());
        Ok(())
    }

    fn wait_for_timeline(
        &self,
        semaphore: vk::Semaphore,
        value: u64,
        _timeout_ns: u64,
    ) -> Result<()> {
        let raw = semaphore.as_raw();
        self.state.lock().timeline_waits.push(value);
        self.wait_until("timeline value", |state| {
            state.timelines.get(&raw).is_some_and(|&current| current >= value)
        })
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state.lock();
        let raw = semaphore.as_raw();
        if state.semaphores.remove(&raw).is_none() && state.timelines.remove(&raw).is_none() {
            state.violations.push("semaphore destroyed twice".to_string());
        }
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.lock();
        match state.fences.remove(&fence.as_raw()) {
            Some(FenceState::Pending) => state
                .violations
                .push("fence destroyed while pending".to_string()),
            None => state.violations.push("fence destroyed twice".to_string()),
            _ => {}
        }
    }
}

impl CommandDevice for MockDevice {
    fn allocate_frame_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let mut state = self.state.lock();
        let buffers: Vec<vk::CommandBuffer> = (0..count).map(|_| state.next()).collect();
        state
            .command_buffers
            .extend(buffers.iter().map(|buffer| buffer.as_raw()));
        Ok(buffers)
    }

    fn begin_frame_commands(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let mut state = self.state.lock();
        if !state.command_buffers.contains(&command_buffer.as_raw()) {
            state
                .violations
                .push("recording into an unknown command buffer".to_string());
        }
        Ok(())
    }

    fn end_frame_commands(&self, _command_buffer: vk::CommandBuffer) -> Result<()> {
        Ok(())
    }

    fn submit_frame(&self, submit: &FrameSubmit) -> Result<()> {
        let mut state = self.state.lock();
        state.submit_calls += 1;
        let call = state.submit_calls;
        if let Some(error) = state.submit_failures.remove(&call) {
            state.trace.push(format!("submit -> {error:?}"));
            return Err(GpuError::Vulkan(error));
        }

        if state.semaphores.insert(submit.wait_semaphore.as_raw(), false) != Some(true) {
            state
                .violations
                .push(format!("submit {call} waits on an unsignaled semaphore"));
        }
        if state.semaphores.insert(submit.signal_semaphore.as_raw(), true) != Some(false) {
            state
                .violations
                .push(format!("submit {call} signals an already signaled semaphore"));
        }

        let mut submission = Submission::default();
        match submit.completion {
            CompletionSignal::Fence(fence) => {
                if state.fences.insert(fence.as_raw(), FenceState::Pending)
                    != Some(FenceState::Unsignaled)
                {
                    state
                        .violations
                        .push(format!("submit {call} with a fence that was not reset"));
                }
                submission.fence = Some(fence);
            }
            CompletionSignal::Timeline { semaphore, value } => {
                let current = state.timelines.get(&semaphore.as_raw()).copied();
                let last_signal = state.timeline_signals.last().copied().unwrap_or(0);
                if current.is_none() || value <= last_signal {
                    state
                        .violations
                        .push(format!("submit {call} signals timeline value {value} out of order"));
                }
                state.timeline_signals.push(value);
                submission.timeline = Some((semaphore, value));
            }
        }
        state.trace.push("submit".to_string());

        if state.auto_complete {
            state.complete(submission);
        } else {
            state.pending.push_back(submission);
        }
        drop(state);
        self.progress.notify_all();
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.wait_idles += 1;
            state.complete_all();
            state.trace.push("wait_idle".to_string());
        }
        self.progress.notify_all();
        Ok(())
    }

    unsafe fn free_frame_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        let mut state = self.state.lock();
        for buffer in command_buffers {
            if !state.command_buffers.remove(&buffer.as_raw()) {
                state.violations.push("command buffer freed twice".to_string());
            }
        }
    }
}

/// Scripted window.
///
/// Each [`WindowSurface::wait_events`] applies the next queued size; when
/// nothing is queued the window closes so a stuck loop cannot hang a test.
#[derive(Debug)]
pub struct MockWindow {
    size: (u32, u32),
    resized: bool,
    close: bool,
    sizes_on_wait: VecDeque<(u32, u32)>,
    pub polls: u32,
    pub waits: u32,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            resized: false,
            close: false,
            sizes_on_wait: VecDeque::new(),
            polls: 0,
            waits: 0,
        }
    }

    /// Change the framebuffer size and raise the resized flag.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.resized = true;
    }

    /// Size to apply on a later `wait_events`.
    pub fn queue_size_on_wait(&mut self, width: u32, height: u32) {
        self.sizes_on_wait.push_back((width, height));
    }

    pub fn close(&mut self) {
        self.close = true;
    }
}

impl WindowSurface for MockWindow {
    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        match self.sizes_on_wait.pop_front() {
            Some((width, height)) => self.resize(width, height),
            None => self.close = true,
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn should_close(&self) -> bool {
        self.close
    }
}

/// Recorder that remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    /// Frames recorded successfully.
    pub frames: Vec<FrameContext>,
    /// Extent of every swapchain it was told about.
    pub recreated: Vec<vk::Extent2D>,
    /// Number of `record` calls, failed ones included.
    pub record_calls: u64,
    /// Number of `on_swapchain_recreated` calls, failed ones included.
    pub rebuild_calls: u64,
    fail_on: HashSet<u64>,
    fail_rebuild_on: HashSet<u64>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `call`-th `record` (1-based) fail.
    pub fn fail_on(mut self, call: u64) -> Self {
        self.fail_on.insert(call);
        self
    }

    /// Make the `call`-th `on_swapchain_recreated` (1-based) fail.
    pub fn fail_rebuild_on(mut self, call: u64) -> Self {
        self.fail_rebuild_on.insert(call);
        self
    }
}

impl FrameRecorder for TraceRecorder {
    fn record(&mut self, frame: &FrameContext) -> anyhow::Result<()> {
        self.record_calls += 1;
        if self.fail_on.contains(&self.record_calls) {
            anyhow::bail!("scripted failure on record call {}", self.record_calls);
        }
        self.frames.push(*frame);
        Ok(())
    }

    fn on_swapchain_recreated(&mut self, swapchain: &Swapchain) -> anyhow::Result<()> {
        self.rebuild_calls += 1;
        if self.fail_rebuild_on.contains(&self.rebuild_calls) {
            anyhow::bail!("scripted failure on rebuild call {}", self.rebuild_calls);
        }
        self.recreated.push(swapchain.extent());
        Ok(())
    }
}
