//! Vulkan instance creation and physical device selection.

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Surface extensions for the current platform, used when no display is known yet.
fn platform_surface_extensions() -> Vec<&'static CStr> {
    vec![
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
    ]
}

/// Instance extensions needed to present to `display`.
///
/// Without a display the platform's usual surface extensions are requested.
pub fn required_instance_extensions(display: Option<RawDisplayHandle>) -> Result<Vec<*const c_char>> {
    #[cfg_attr(not(target_os = "macos"), allow(unused_mut))]
    let mut extensions: Vec<*const c_char> = match display {
        Some(display) => ash_window::enumerate_required_extensions(display)?.to_vec(),
        None => platform_surface_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect(),
    };

    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());

    Ok(extensions)
}

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Create a Vulkan 1.3 instance.
///
/// A missing validation layer is logged and skipped rather than failing.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: Option<RawDisplayHandle>,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::Other(format!("Invalid application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"vkframes")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    let extension_names = required_instance_extensions(display)?;

    let mut layer_names: Vec<*const c_char> = Vec::new();
    if enable_validation {
        // SAFETY: Forwarded from the caller.
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        let found = available_layers
            .iter()
            .any(|props| {
                props
                    .layer_name_as_c_str()
                    .is_ok_and(|name| name == VALIDATION_LAYER)
            });
        if found {
            layer_names.push(VALIDATION_LAYER.as_ptr());
        } else {
            tracing::warn!(
                "Validation layer {} not available",
                VALIDATION_LAYER.to_string_lossy()
            );
        }
    }

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    // SAFETY: Forwarded from the caller.
    let instance = unsafe { entry.create_instance(&create_info, None)? };

    Ok(instance)
}

/// Select the highest scoring physical device that meets the requirements.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
) -> Result<(vk::PhysicalDevice, GpuCapabilities)> {
    // SAFETY: Forwarded from the caller.
    let devices = unsafe { instance.enumerate_physical_devices()? };

    let mut best: Option<(vk::PhysicalDevice, GpuCapabilities)> = None;
    let mut rejected = Vec::new();

    for device in devices {
        // SAFETY: The device was enumerated from this instance.
        let capabilities = unsafe { GpuCapabilities::query(instance, device) };
        let missing = capabilities.missing_requirements();
        if !missing.is_empty() {
            tracing::debug!(
                "Skipping {}: missing {}",
                capabilities.device_name,
                missing.join(", ")
            );
            rejected.push(format!("{} ({})", capabilities.device_name, missing.join(", ")));
            continue;
        }
        if best
            .as_ref()
            .map_or(true, |(_, current)| capabilities.score() > current.score())
        {
            best = Some((device, capabilities));
        }
    }

    match best {
        Some(selected) => Ok(selected),
        None if rejected.is_empty() => Err(GpuError::NoSuitableDevice),
        None => Err(GpuError::FeatureNotSupported(rejected.join("; "))),
    }
}
