//! GPU context management.

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device};
use crate::memory::GpuAllocator;
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::RawDisplayHandle;
use std::sync::Arc;

/// Instance, device and allocator shared by everything that renders.
///
/// Dropping the context waits for the device, shuts the allocator down and
/// destroys the device and instance, in that order.
pub struct GpuContext {
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    capabilities: GpuCapabilities,
    allocator: Mutex<GpuAllocator>,
    graphics_queue_family: u32,
    graphics_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Shared handle to the device, for objects that outlive a borrow.
    pub fn device_arc(&self) -> &Arc<ash::Device> {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn wait_idle(&self) -> Result<()> {
        // SAFETY: The device is valid for the lifetime of the context.
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // SAFETY: Everything created from this device has been destroyed by its owner.
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocator memory must be freed before the device goes away.
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    display: Option<RawDisplayHandle>,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "vkframes".to_string(),
            enable_validation: cfg!(debug_assertions),
            display: None,
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Request the instance extensions needed to present on `display`.
    pub fn display(mut self, display: RawDisplayHandle) -> Self {
        self.display = Some(display);
        self
    }

    /// Build the GPU context.
    pub fn build(self) -> Result<GpuContext> {
        // SAFETY: Loading the system Vulkan library has no preconditions we can check.
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        // SAFETY: The entry was just loaded.
        let instance =
            unsafe { create_instance(&entry, &self.app_name, self.display, self.enable_validation) }?;

        match Self::create_on(&instance) {
            Ok((physical_device, capabilities, device, family, queue, allocator)) => {
                Ok(GpuContext {
                    entry,
                    instance,
                    physical_device,
                    device,
                    capabilities,
                    allocator: Mutex::new(allocator),
                    graphics_queue_family: family,
                    graphics_queue: queue,
                })
            }
            Err(e) => {
                // SAFETY: Nothing created from the instance survives the failed build.
                unsafe { instance.destroy_instance(None) };
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn create_on(
        instance: &ash::Instance,
    ) -> Result<(
        vk::PhysicalDevice,
        GpuCapabilities,
        Arc<ash::Device>,
        u32,
        vk::Queue,
        GpuAllocator,
    )> {
        // SAFETY: The instance is valid.
        let (physical_device, capabilities) = unsafe { select_physical_device(instance) }?;
        tracing::info!("Selected GPU: {}", capabilities.summary());

        // SAFETY: The physical device was enumerated from this instance.
        let graphics_family = unsafe { find_graphics_queue_family(instance, physical_device) }?;

        // SAFETY: The physical device meets the feature requirements enabled below.
        let (device, graphics_queue) =
            unsafe { create_device(instance, physical_device, graphics_family)? };
        let device = Arc::new(device);

        // SAFETY: All three handles are valid and belong together.
        let allocator = match unsafe {
            GpuAllocator::new(instance, Arc::clone(&device), physical_device)
        } {
            Ok(allocator) => allocator,
            Err(e) => {
                // SAFETY: Nothing was created from the device yet.
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        Ok((
            physical_device,
            capabilities,
            device,
            graphics_family,
            graphics_queue,
            allocator,
        ))
    }
}

/// First queue family with graphics support.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32> {
    // SAFETY: Forwarded from the caller.
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
        .ok_or(GpuError::NoSuitableDevice)
}

/// Create the logical device with one graphics queue.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
) -> Result<(ash::Device, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_family)
        .queue_priorities(std::slice::from_ref(&queue_priority))];

    let extension_names = [ash::khr::swapchain::NAME.as_ptr()];

    let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);

    let mut vulkan_1_2_features =
        vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);

    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut vulkan_1_3_features)
        .push_next(&mut vulkan_1_2_features);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    // SAFETY: Forwarded from the caller.
    let device = unsafe { instance.create_device(physical_device, &device_create_info, None)? };

    // SAFETY: The queue was requested in the create info.
    let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };

    Ok((device, graphics_queue))
}
