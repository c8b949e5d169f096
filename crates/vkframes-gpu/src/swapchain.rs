//! Swapchain management.
//!
//! [`Swapchain`] is the negotiated swapchain plus one view per image. It is
//! only ever built whole by [`Swapchain::create`] and torn down whole by
//! [`Swapchain::destroy`]. [`SwapchainLifecycle`] owns the current swapchain and
//! replaces it on resize, handing the old handle to the driver for recycling.

use crate::error::{GpuError, Result};
use ash::prelude::VkResult;
use ash::vk;

/// Vulkan calls needed to build, use and destroy a swapchain.
///
/// Implemented by [`SurfaceContext`](crate::SurfaceContext) for a real surface and
/// by the mock device in `vkframes-test`.
pub trait SwapchainDevice {
    /// The surface swapchains are created for.
    fn surface(&self) -> vk::SurfaceKHR;

    /// Query surface capabilities, formats and present modes.
    fn surface_support(&self) -> Result<SurfaceSupport>;

    /// Create a swapchain.
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR<'_>) -> Result<vk::SwapchainKHR>;

    /// Retrieve the images owned by a swapchain.
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;

    /// Create an image view.
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView>;

    /// Acquire the next presentable image.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireOutcome>;

    /// Queue an image for presentation.
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<PresentOutcome>;

    /// Destroy an image view.
    ///
    /// # Safety
    /// The view must not be in use by the GPU.
    unsafe fn destroy_image_view(&self, view: vk::ImageView);

    /// Destroy a swapchain.
    ///
    /// # Safety
    /// The swapchain must not be in use and its views must already be destroyed.
    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
}

/// Result of an image acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; the semaphore will be signalled.
    Acquired { image_index: u32, suboptimal: bool },
    /// No image was acquired; the swapchain must be recreated.
    OutOfDate,
}

/// Result of a present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented, but the swapchain should be recreated.
    Suboptimal,
    /// Not presented; the swapchain must be recreated.
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain should be recreated before the next frame.
    pub fn needs_recreate(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// Map a raw acquire result to an [`AcquireOutcome`].
pub fn acquire_outcome(result: VkResult<(u32, bool)>) -> Result<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        }),
        // OUT_OF_DATE means no image was acquired and the semaphore stays unsignalled.
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(GpuError::from(e)),
    }
}

/// Map a raw present result to a [`PresentOutcome`].
pub fn present_outcome(result: VkResult<bool>) -> Result<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
        Err(e) => Err(GpuError::from(e)),
    }
}

/// Surface capabilities query result.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Caller preferences for swapchain creation.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    /// Used when supported, otherwise FIFO.
    pub preferred_present_mode: vk::PresentModeKHR,
    /// Usage flags for the swapchain images.
    pub image_usage: vk::ImageUsageFlags,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            preferred_present_mode: vk::PresentModeKHR::MAILBOX,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
        }
    }
}

/// Swapchain parameters negotiated from [`SurfaceSupport`].
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPlan {
    pub image_count: u32,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub image_usage: vk::ImageUsageFlags,
}

impl SwapchainPlan {
    /// Negotiate swapchain parameters.
    ///
    /// Fails if the surface reports no formats or no present modes, or cannot
    /// provide the requested image usage.
    pub fn negotiate(
        support: &SurfaceSupport,
        desired_extent: vk::Extent2D,
        config: &SwapchainConfig,
    ) -> Result<Self> {
        if support.formats.is_empty() {
            return Err(GpuError::NoSurfaceFormats);
        }
        if support.present_modes.is_empty() {
            return Err(GpuError::NoPresentModes);
        }

        let capabilities = &support.capabilities;
        let missing_usage = config.image_usage & !capabilities.supported_usage_flags;
        if !missing_usage.is_empty() {
            return Err(GpuError::UnsupportedImageUsage(missing_usage));
        }

        Ok(Self {
            image_count: choose_image_count(capabilities),
            surface_format: select_surface_format(&support.formats),
            present_mode: select_present_mode(
                &support.present_modes,
                config.preferred_present_mode,
            ),
            extent: calculate_extent(capabilities, desired_extent),
            pre_transform: capabilities.current_transform,
            composite_alpha: choose_composite_alpha(capabilities),
            image_usage: config.image_usage,
        })
    }
}

/// Swapchain wrapper.
///
/// Owns the swapchain handle and one image view per swapchain image.
#[derive(Debug)]
pub struct Swapchain {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a new swapchain.
    ///
    /// `old_swapchain` is handed to the driver as a recycling hint. It stays
    /// valid and is still owned by the caller, who destroys it once this call
    /// has returned successfully.
    ///
    /// Either a complete swapchain is returned or everything created along the
    /// way is destroyed again before the error is returned.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn create<D: SwapchainDevice + ?Sized>(
        device: &D,
        desired_extent: vk::Extent2D,
        config: &SwapchainConfig,
        queue_families: &[u32],
        old_swapchain: Option<&Swapchain>,
    ) -> Result<Self> {
        let support = device.surface_support()?;
        let plan = SwapchainPlan::negotiate(&support, desired_extent, config)?;

        if plan.extent.width == 0 || plan.extent.height == 0 {
            return Err(GpuError::ZeroExtent {
                width: plan.extent.width,
                height: plan.extent.height,
            });
        }

        let sharing_mode = if queue_families.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(device.surface())
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(plan.image_usage)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(queue_families)
            .pre_transform(plan.pre_transform)
            .composite_alpha(plan.composite_alpha)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.map_or(vk::SwapchainKHR::null(), |old| old.swapchain));

        let swapchain = device.create_swapchain(&create_info)?;

        let images = match device.swapchain_images(swapchain) {
            Ok(images) => images,
            Err(e) => {
                // SAFETY: The swapchain was just created and has never been used.
                unsafe { device.destroy_swapchain(swapchain) };
                return Err(e);
            }
        };

        let image_views = match create_image_views(device, &images, plan.surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                // SAFETY: The swapchain was just created and has never been used.
                unsafe { device.destroy_swapchain(swapchain) };
                return Err(e);
            }
        };

        tracing::info!(
            "Swapchain created: {}x{} {:?}/{:?} {:?} ({} images)",
            plan.extent.width,
            plan.extent.height,
            plan.surface_format.format,
            plan.surface_format.color_space,
            plan.present_mode,
            images.len()
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            surface_format: plan.surface_format,
            present_mode: plan.present_mode,
            extent: plan.extent,
        })
    }

    /// Get the raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain images, indexed by acquired image index.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per swapchain image.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Acquire the next image, signalling `semaphore` when it is ready.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn acquire_next_image<D: SwapchainDevice + ?Sized>(
        &self,
        device: &D,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquireOutcome> {
        let outcome = device.acquire_next_image(self.swapchain, timeout_ns, semaphore)?;
        if let AcquireOutcome::Acquired { image_index, .. } = outcome {
            if image_index as usize >= self.images.len() {
                return Err(GpuError::InvalidState(format!(
                    "Acquired image index {image_index} out of range ({} images)",
                    self.images.len()
                )));
            }
        }
        Ok(outcome)
    }

    /// Present an image.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn present<D: SwapchainDevice + ?Sized>(
        &self,
        device: &D,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<PresentOutcome> {
        device.present(self.swapchain, image_index, wait_semaphores)
    }

    /// Destroy the image views, then the swapchain.
    ///
    /// # Safety
    /// The swapchain and its views must not be in use.
    pub unsafe fn destroy<D: SwapchainDevice + ?Sized>(self, device: &D) {
        // SAFETY: Caller guarantees nothing references these objects anymore.
        unsafe {
            for view in self.image_views {
                device.destroy_image_view(view);
            }
            device.destroy_swapchain(self.swapchain);
        }
    }
}

/// Owns the current [`Swapchain`] and rebuilds it on demand.
#[derive(Debug)]
pub struct SwapchainLifecycle {
    current: Swapchain,
    config: SwapchainConfig,
    queue_families: Vec<u32>,
    generation: u64,
}

impl SwapchainLifecycle {
    /// Create the initial swapchain.
    pub fn create<D: SwapchainDevice + ?Sized>(
        device: &D,
        desired_extent: vk::Extent2D,
        config: SwapchainConfig,
        queue_families: Vec<u32>,
    ) -> Result<Self> {
        let current = Swapchain::create(device, desired_extent, &config, &queue_families, None)?;
        Ok(Self {
            current,
            config,
            queue_families,
            generation: 0,
        })
    }

    /// Replace the swapchain with one matching `desired_extent`.
    ///
    /// The old swapchain is passed as the recycling hint and destroyed only
    /// after the new one exists. On failure the old swapchain is kept.
    ///
    /// # Safety
    /// The current swapchain must not be in use (wait for device idle first).
    pub unsafe fn recreate<D: SwapchainDevice + ?Sized>(
        &mut self,
        device: &D,
        desired_extent: vk::Extent2D,
    ) -> Result<&Swapchain> {
        let new = Swapchain::create(
            device,
            desired_extent,
            &self.config,
            &self.queue_families,
            Some(&self.current),
        )?;
        let old = std::mem::replace(&mut self.current, new);
        // SAFETY: Caller guarantees the old swapchain is idle; the new one exists.
        unsafe { old.destroy(device) };
        self.generation += 1;
        Ok(&self.current)
    }

    /// The current swapchain.
    pub fn current(&self) -> &Swapchain {
        &self.current
    }

    /// Number of times the swapchain has been recreated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    /// Change the preferred present mode. Takes effect on the next recreate.
    pub fn set_preferred_present_mode(&mut self, mode: vk::PresentModeKHR) {
        self.config.preferred_present_mode = mode;
    }

    /// Destroy the current swapchain.
    ///
    /// # Safety
    /// The swapchain must not be in use.
    pub unsafe fn destroy<D: SwapchainDevice + ?Sized>(self, device: &D) {
        // SAFETY: Forwarded from the caller.
        unsafe { self.current.destroy(device) };
    }
}

/// Create one colour view per image. On failure, already created views are destroyed.
fn create_image_views<D: SwapchainDevice + ?Sized>(
    device: &D,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());
    for &image in images {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        match device.create_image_view(&view_info) {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views.drain(..) {
                    // SAFETY: These views were just created and never used.
                    unsafe { device.destroy_image_view(view) };
                }
                return Err(e);
            }
        }
    }
    Ok(image_views)
}

/// Select the best surface format.
///
/// Prefers 8-bit BGRA sRGB with the sRGB non-linear colour space, otherwise
/// the first reported format. `available` must not be empty.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .copied()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(available[0])
}

/// Select the present mode: `preferred` if supported, otherwise FIFO (always supported).
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// `min_image_count + 1`, clamped to `max_image_count` (0 means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        image_count = image_count.min(capabilities.max_image_count);
    }
    image_count
}

fn choose_composite_alpha(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|&alpha| capabilities.supported_composite_alpha.contains(alpha))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::INHERIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn variable_extent_caps(min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
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
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_DST,
            ..Default::default()
        }
    }

    #[test]
    fn surface_format_prefers_bgra_srgb() {
        let chosen = select_surface_format(&[
            format(vk::Format::R8G8B8A8_UNORM),
            format(vk::Format::B8G8R8A8_SRGB),
        ]);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_requires_srgb_nonlinear_colour_space() {
        let extended = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        let chosen = select_surface_format(&[format(vk::Format::R8G8B8A8_UNORM), extended]);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn surface_format_is_deterministic() {
        let available = [
            format(vk::Format::A2B10G10R10_UNORM_PACK32),
            format(vk::Format::R8G8B8A8_SRGB),
            format(vk::Format::B8G8R8A8_UNORM),
        ];
        let first = select_surface_format(&available);
        for _ in 0..16 {
            let again = select_surface_format(&available);
            assert_eq!(again.format, first.format);
            assert_eq!(again.color_space, first.color_space);
        }
        assert_eq!(first.format, vk::Format::A2B10G10R10_UNORM_PACK32);
    }

    #[test]
    fn present_mode_uses_preferred_when_supported() {
        let all = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::FIFO_RELAXED,
        ];
        for preferred in all {
            assert_eq!(select_present_mode(&all, preferred), preferred);
        }
    }

    #[test]
    fn present_mode_falls_back_to_fifo_only() {
        let available = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
        assert_eq!(
            select_present_mode(&available, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO], vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn image_count_unbounded_is_min_plus_one() {
        for min in [1, 2, 3, 8, 64, 1000] {
            assert_eq!(choose_image_count(&variable_extent_caps(min, 0)), min + 1);
        }
    }

    #[test]
    fn image_count_never_exceeds_max() {
        for (min, max) in [(1, 1), (2, 2), (2, 3), (3, 3), (2, 8)] {
            let count = choose_image_count(&variable_extent_caps(min, max));
            assert!(count <= max);
            assert!(count >= min);
        }
    }

    #[test]
    fn extent_uses_current_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };
        let chosen = calculate_extent(
            &caps,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!((chosen.width, chosen.height), (1280, 720));
    }

    #[test]
    fn extent_clamps_when_variable() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let chosen = calculate_extent(
            &caps,
            vk::Extent2D {
                width: 4000,
                height: 200,
            },
        );
        assert_eq!((chosen.width, chosen.height), (1920, 480));
    }

    #[test]
    fn negotiate_rejects_empty_support() {
        let mut support = SurfaceSupport {
            capabilities: variable_extent_caps(2, 0),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let config = SwapchainConfig::default();
        assert!(matches!(
            SwapchainPlan::negotiate(&support, extent, &config),
            Err(GpuError::NoSurfaceFormats)
        ));

        support.formats.push(format(vk::Format::B8G8R8A8_SRGB));
        support.present_modes.clear();
        assert!(matches!(
            SwapchainPlan::negotiate(&support, extent, &config),
            Err(GpuError::NoPresentModes)
        ));
    }

    #[test]
    fn negotiate_rejects_unsupported_image_usage() {
        let mut support = SurfaceSupport {
            capabilities: variable_extent_caps(2, 0),
            formats: vec![format(vk::Format::B8G8R8A8_SRGB)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        support.capabilities.supported_usage_flags = vk::ImageUsageFlags::COLOR_ATTACHMENT;
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };

        let err = SwapchainPlan::negotiate(&support, extent, &SwapchainConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            GpuError::UnsupportedImageUsage(missing) if missing == vk::ImageUsageFlags::TRANSFER_DST
        ));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let color_only = SwapchainConfig {
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ..Default::default()
        };
        assert!(SwapchainPlan::negotiate(&support, extent, &color_only).is_ok());
    }

    #[test]
    fn negotiate_end_to_end() {
        let support = SurfaceSupport {
            capabilities: variable_extent_caps(2, 0),
            formats: vec![
                format(vk::Format::R8G8B8A8_UNORM),
                format(vk::Format::B8G8R8A8_SRGB),
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };
        let config = SwapchainConfig {
            preferred_present_mode: vk::PresentModeKHR::MAILBOX,
            ..Default::default()
        };
        let plan = SwapchainPlan::negotiate(
            &support,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            &config,
        )
        .unwrap();

        assert_eq!(plan.image_count, 3);
        assert_eq!(plan.surface_format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!((plan.extent.width, plan.extent.height), (800, 600));
    }

    #[test]
    fn composite_alpha_prefers_opaque() {
        let caps = vk::SurfaceCapabilitiesKHR {
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
                | vk::CompositeAlphaFlagsKHR::OPAQUE,
            ..Default::default()
        };
        assert_eq!(choose_composite_alpha(&caps), vk::CompositeAlphaFlagsKHR::OPAQUE);
    }

    #[test]
    fn raw_results_map_to_outcomes() {
        assert_eq!(
            acquire_outcome(Ok((1, false))).unwrap(),
            AcquireOutcome::Acquired {
                image_index: 1,
                suboptimal: false
            }
        );
        assert_eq!(
            acquire_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(acquire_outcome(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());

        assert_eq!(present_outcome(Ok(false)).unwrap(), PresentOutcome::Presented);
        assert_eq!(present_outcome(Ok(true)).unwrap(), PresentOutcome::Suboptimal);
        assert_eq!(
            present_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentOutcome::OutOfDate
        );
        assert!(present_outcome(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }
}
