//! GPU capability detection.

use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    pub vendor: GpuVendor,
    pub device_name: String,
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    pub driver_version: u32,

    /// Dynamic rendering (VK 1.3 core)
    pub supports_dynamic_rendering: bool,
    /// Synchronization2 (VK 1.3 core)
    pub supports_synchronization2: bool,
    /// Timeline semaphores (VK 1.2 core)
    pub supports_timeline_semaphore: bool,
    /// `VK_KHR_swapchain` is available
    pub supports_swapchain: bool,

    /// Device-local memory in MB
    pub device_local_memory_mb: u64,

    pub available_extensions: HashSet<String>,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        // SAFETY: Forwarded from the caller.
        let (properties, memory_properties, extensions) = unsafe {
            (
                instance.get_physical_device_properties(physical_device),
                instance.get_physical_device_memory_properties(physical_device),
                instance
                    .enumerate_device_extension_properties(physical_device)
                    .unwrap_or_default(),
            )
        };

        let available_extensions: HashSet<String> = extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .filter_map(|name| name.to_str().ok().map(String::from))
            .collect();

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let device_local_memory_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        let mut vulkan_1_2_features = vk::PhysicalDeviceVulkan12Features::default();
        let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default();
        let api_version = properties.api_version;
        if has_vulkan_1_3(api_version) {
            let mut features2 = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut vulkan_1_2_features)
                .push_next(&mut vulkan_1_3_features);
            // SAFETY: The device reports Vulkan 1.3, so both structs are valid in the chain.
            unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        }

        Self {
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version,
            driver_version: properties.driver_version,

            supports_dynamic_rendering: vulkan_1_3_features.dynamic_rendering == vk::TRUE,
            supports_synchronization2: vulkan_1_3_features.synchronization2 == vk::TRUE,
            supports_timeline_semaphore: vulkan_1_2_features.timeline_semaphore == vk::TRUE,
            supports_swapchain: available_extensions.contains(
                ash::khr::swapchain::NAME
                    .to_str()
                    .unwrap_or("VK_KHR_swapchain"),
            ),

            device_local_memory_mb,
            available_extensions,
        }
    }

    /// Requirements this device fails, empty if it is usable.
    pub fn missing_requirements(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !has_vulkan_1_3(self.api_version) {
            missing.push("Vulkan 1.3");
        }
        if !self.supports_swapchain {
            missing.push("VK_KHR_swapchain");
        }
        if !self.supports_dynamic_rendering {
            missing.push("dynamicRendering");
        }
        if !self.supports_synchronization2 {
            missing.push("synchronization2");
        }
        if !self.supports_timeline_semaphore {
            missing.push("timelineSemaphore");
        }
        missing
    }

    /// Check if the GPU meets minimum requirements.
    pub fn meets_requirements(&self) -> bool {
        self.missing_requirements().is_empty()
    }

    /// Preference score for device selection; higher is better.
    pub fn score(&self) -> u64 {
        let type_score = match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
            _ => 0,
        };
        // +1 per GB of VRAM
        type_score + self.device_local_memory_mb / 1024
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }
}

fn has_vulkan_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

/// Name of an extension as reported in [`GpuCapabilities::available_extensions`].
pub fn extension_name(name: &CStr) -> String {
    name.to_string_lossy().into_owned()
}
