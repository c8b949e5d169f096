//! Surface management for windowed rendering.
//!
//! [`SurfaceContext`] binds a window surface to the graphics queue of a
//! [`GpuContext`] and is the real implementation of the device seams the
//! frame loop uses.

use crate::command::{
    begin_one_time_commands, end_command_buffer, submit_frame, CommandDevice, CommandPool,
    FrameSubmit,
};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::swapchain::{
    acquire_outcome, present_outcome, AcquireOutcome, PresentOutcome, SurfaceSupport,
    SwapchainDevice,
};
use crate::sync::SyncDevice;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

/// Surface context for windowed rendering.
///
/// Owns the Vulkan surface, the extension loaders and the command pool
/// frame command buffers are allocated from. Dropping it destroys the pool
/// and the surface, so it must go before the [`GpuContext`].
pub struct SurfaceContext {
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    device: Arc<ash::Device>,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
    queue_family: u32,
    command_pool: CommandPool,
}

impl SurfaceContext {
    /// Create a surface for `window` on the GPU context's instance.
    ///
    /// Fails with [`GpuError::PresentNotSupported`] if the graphics queue
    /// family cannot present to the new surface.
    ///
    /// # Safety
    /// The window must outlive the returned context.
    pub unsafe fn from_window<W>(gpu: &GpuContext, window: &W) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        // SAFETY: The handles come from a live window the caller keeps alive.
        let surface = unsafe {
            ash_window::create_surface(
                gpu.entry(),
                gpu.instance(),
                display.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;

        let surface_loader = ash::khr::surface::Instance::new(gpu.entry(), gpu.instance());
        let queue_family = gpu.graphics_queue_family();

        // SAFETY: Surface and physical device belong to the same instance.
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                gpu.physical_device(),
                queue_family,
                surface,
            )
        };
        match supported {
            Ok(true) => {}
            Ok(false) => {
                // SAFETY: The surface was just created and is unused.
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(GpuError::PresentNotSupported(queue_family));
            }
            Err(e) => {
                // SAFETY: The surface was just created and is unused.
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e.into());
            }
        }

        // SAFETY: The device is valid and owns the graphics queue family.
        let command_pool = match unsafe {
            CommandPool::new(
                gpu.device(),
                queue_family,
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )
        } {
            Ok(pool) => pool,
            Err(e) => {
                // SAFETY: The surface was just created and is unused.
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let swapchain_loader = ash::khr::swapchain::Device::new(gpu.instance(), gpu.device());

        tracing::debug!("Created surface for queue family {queue_family}");

        Ok(Self {
            surface,
            surface_loader,
            swapchain_loader,
            device: Arc::clone(gpu.device_arc()),
            physical_device: gpu.physical_device(),
            queue: gpu.graphics_queue(),
            queue_family,
            command_pool,
        })
    }

    /// The surface handle.
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Queue family used for rendering and presentation.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// The logical device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }
}

impl Drop for SurfaceContext {
    fn drop(&mut self) {
        // SAFETY: Swapchains and command buffers are released by the frame loop
        // before the surface context is dropped.
        unsafe {
            self.command_pool.destroy(&self.device);
            self.surface_loader.destroy_surface(self.surface, None);
        }
        tracing::debug!("Surface destroyed");
    }
}

impl SwapchainDevice for SurfaceContext {
    fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    fn surface_support(&self) -> Result<SurfaceSupport> {
        // SAFETY: Surface and physical device belong to the same instance.
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)?;

            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(self.physical_device, self.surface)?;

            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, self.surface)?;

            Ok(SurfaceSupport {
                capabilities,
                formats,
                present_modes,
            })
        }
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> Result<vk::SwapchainKHR> {
        // SAFETY: The create info references this context's surface.
        unsafe { self.swapchain_loader.create_swapchain(info, None) }
            .map_err(GpuError::SwapchainCreation)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        // SAFETY: The swapchain was created by this loader.
        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain)? };
        Ok(images)
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView> {
        // SAFETY: The view info references an image owned by this device.
        let view = unsafe { self.device.create_image_view(info, None)? };
        Ok(view)
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        // SAFETY: The semaphore is unsignaled with no pending operations.
        acquire_outcome(unsafe {
            self.swapchain_loader.acquire_next_image(
                swapchain,
                timeout_ns,
                semaphore,
                vk::Fence::null(),
            )
        })
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<PresentOutcome> {
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: The image was acquired and its rendering is signaled on the wait semaphores.
        present_outcome(unsafe {
            self.swapchain_loader
                .queue_present(self.queue, &present_info)
        })
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        // SAFETY: Forwarded from the caller.
        unsafe { self.device.destroy_image_view(view, None) };
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        // SAFETY: Forwarded from the caller.
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }
}

impl SyncDevice for SurfaceContext {
    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        SyncDevice::create_semaphore(&*self.device)
    }

    fn create_timeline_semaphore(&self, initial_value: u64) -> Result<vk::Semaphore> {
        SyncDevice::create_timeline_semaphore(&*self.device, initial_value)
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        SyncDevice::create_fence(&*self.device, signaled)
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        SyncDevice::wait_for_fence(&*self.device, fence, timeout_ns)
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        SyncDevice::reset_fence(&*self.device, fence)
    }

    fn wait_for_timeline(
        &self,
        semaphore: vk::Semaphore,
        value: u64,
        timeout_ns: u64,
    ) -> Result<()> {
        SyncDevice::wait_for_timeline(&*self.device, semaphore, value, timeout_ns)
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        // SAFETY: Forwarded from the caller.
        unsafe { SyncDevice::destroy_semaphore(&*self.device, semaphore) };
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        // SAFETY: Forwarded from the caller.
        unsafe { SyncDevice::destroy_fence(&*self.device, fence) };
    }
}

impl CommandDevice for SurfaceContext {
    fn allocate_frame_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        // SAFETY: The pool was created from this device.
        unsafe { self.command_pool.allocate_command_buffers(&self.device, count) }
    }

    fn begin_frame_commands(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        // SAFETY: The pool allows per-buffer reset and the slot's previous submission completed.
        unsafe { begin_one_time_commands(&self.device, command_buffer) }
    }

    fn end_frame_commands(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        // SAFETY: The buffer is recording.
        unsafe { end_command_buffer(&self.device, command_buffer) }
    }

    fn submit_frame(&self, submit: &FrameSubmit) -> Result<()> {
        // SAFETY: The frame loop armed the completion marker right before submitting.
        unsafe { submit_frame(&self.device, self.queue, submit) }
    }

    fn wait_idle(&self) -> Result<()> {
        // SAFETY: The device is valid.
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    unsafe fn free_frame_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        // SAFETY: Forwarded from the caller.
        unsafe {
            self.command_pool
                .free_command_buffers(&self.device, command_buffers);
        }
    }
}
