//! Swapchain management.
//!
//! This module handles surface capability negotiation, VkSwapchainKHR
//! creation, image acquisition, and presentation.
//!
//! # Overview
//!
//! Negotiation is split from creation. [`negotiate`] is a pure function of the
//! surface capabilities and the framebuffer size, so calling it again with the
//! same inputs always produces the same [`SwapchainConfig`]. [`Swapchain::new`]
//! then turns a config into a live swapchain plus one image view per image.
//!
//! # Example
//!
//! ```no_run
//! use inflight_rhi::swapchain::{SwapchainSupportDetails, negotiate};
//! use ash::vk;
//!
//! # fn demo(
//! #     instance: &inflight_rhi::instance::Instance,
//! #     device: std::sync::Arc<inflight_rhi::device::Device>,
//! #     surface: vk::SurfaceKHR,
//! #     loader: &ash::khr::surface::Instance,
//! # ) -> inflight_rhi::RhiResult<()> {
//! use inflight_rhi::swapchain::Swapchain;
//!
//! let support = SwapchainSupportDetails::query(device.physical_device(), surface, loader)?;
//! let config = negotiate(&support, (800, 600), vk::PresentModeKHR::MAILBOX)?;
//! let swapchain = Swapchain::new(instance, device, surface, &config)?;
//!
//! // In render loop:
//! // let (image_index, suboptimal) = swapchain.acquire_next_image(semaphore, u64::MAX)?;
//! // let suboptimal = swapchain.present(queue, image_index, render_finished)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;

/// Preferred surface format.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Swapchain surface support details.
///
/// Contains information about what the surface supports for swapchain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Checks if the swapchain support is adequate for rendering.
    ///
    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Result of swapchain negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    /// Requested image count. The driver may hand back more.
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Derives format, present mode, extent, and image count from surface support.
///
/// `framebuffer_size` is the drawable pixel size reported by the window
/// system. It is only consulted when the surface reports the adaptive extent
/// sentinel. `preferred_present_mode` is used when supported, otherwise FIFO.
///
/// # Errors
///
/// Returns [`RhiError::SwapchainError`] if the surface reports no formats or
/// no present modes.
pub fn negotiate(
    support: &SwapchainSupportDetails,
    framebuffer_size: (u32, u32),
    preferred_present_mode: vk::PresentModeKHR,
) -> Result<SwapchainConfig, RhiError> {
    if !support.is_adequate() {
        return Err(RhiError::SwapchainError(
            "Inadequate swapchain support (no formats or present modes)".to_string(),
        ));
    }

    let (width, height) = framebuffer_size;

    Ok(SwapchainConfig {
        surface_format: choose_surface_format(&support.formats),
        present_mode: choose_present_mode(&support.present_modes, preferred_present_mode),
        extent: choose_extent(&support.capabilities, width, height),
        image_count: determine_image_count(&support.capabilities),
        pre_transform: support.capabilities.current_transform,
    })
}

/// Vulkan swapchain wrapper.
///
/// This struct manages the swapchain and its associated resources:
/// - Swapchain images (owned by the swapchain, not explicitly managed)
/// - Image views (managed by this struct)
///
/// Format, extent, and image count never change for the lifetime of a
/// `Swapchain`. A mismatch with the surface is handled by dropping it and
/// creating a new one.
pub struct Swapchain {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Swapchain extension loader
    swapchain_loader: ash::khr::swapchain::Device,
    /// Swapchain handle
    swapchain: vk::SwapchainKHR,
    /// Swapchain images (owned by the swapchain)
    images: Vec<vk::Image>,
    /// Image views for the swapchain images
    image_views: Vec<vk::ImageView>,
    /// Negotiated settings this swapchain was created with
    config: SwapchainConfig,
}

impl Swapchain {
    /// Creates a new swapchain from a negotiated config.
    ///
    /// Images use `COLOR_ATTACHMENT` usage. When graphics and present queue
    /// families differ the images are shared concurrently between them.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Swapchain creation fails
    /// - Image view creation fails
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        config: &SwapchainConfig,
    ) -> Result<Self, RhiError> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
            config.extent.width,
            config.extent.height,
            config.surface_format.format,
            config.surface_format.color_space,
            config.present_mode,
            config.image_count
        );

        let queue_families = *device.queue_families();
        let queue_family_indices: Vec<u32> = queue_families.unique_families();

        let (sharing_mode, queue_family_indices_slice) = if queue_families.is_split() {
            debug!(
                "Using CONCURRENT sharing mode between queue families {:?}",
                queue_family_indices
            );
            (vk::SharingMode::CONCURRENT, queue_family_indices.as_slice())
        } else {
            debug!("Using EXCLUSIVE sharing mode (same queue family for graphics and present)");
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(queue_family_indices_slice)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        // The driver decides the final count
        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };
        info!("Swapchain created with {} images", images.len());

        let image_views =
            match create_image_views(&device, &images, config.surface_format.format) {
                Ok(views) => views,
                Err(e) => {
                    unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                    return Err(e);
                }
            };

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            config: *config,
        })
    }

    /// Acquires the next swapchain image for rendering.
    ///
    /// # Arguments
    ///
    /// * `semaphore` - Semaphore to signal when the image is available
    /// * `timeout` - Timeout in nanoseconds (`u64::MAX` waits forever)
    ///
    /// # Returns
    ///
    /// Returns a tuple of (image_index, suboptimal).
    ///
    /// # Errors
    ///
    /// Returns the raw `vk::Result` so callers can tell
    /// `ERROR_OUT_OF_DATE_KHR` apart from genuine failures.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout: u64,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Presents the rendered image to the screen.
    ///
    /// # Arguments
    ///
    /// * `queue` - The presentation queue
    /// * `image_index` - Index of the image to present (from `acquire_next_image`)
    /// * `wait_semaphore` - Semaphore to wait on before presenting
    ///
    /// # Returns
    ///
    /// Returns true if the swapchain is suboptimal and should be recreated.
    ///
    /// # Errors
    ///
    /// Returns the raw `vk::Result`, including `ERROR_OUT_OF_DATE_KHR`.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the negotiated settings.
    #[inline]
    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.config.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns all image views.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.handle().destroy_image_view(image_view, None);
            }
            // Images are owned by the swapchain
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.config.extent.width,
            self.config.extent.height,
            self.images.len()
        );
    }
}

/// Chooses the surface format.
///
/// Prefers [`PREFERRED_SURFACE_FORMAT`] and otherwise takes the first
/// supported format. `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.contains(&PREFERRED_SURFACE_FORMAT) {
        debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return PREFERRED_SURFACE_FORMAT;
    }

    let first = formats.first().copied().unwrap_or(PREFERRED_SURFACE_FORMAT);
    warn!("Using first available surface format: {:?}", first.format);
    first
}

/// Chooses the present mode.
///
/// Uses `preferred` when the surface supports it and falls back to FIFO,
/// which every surface supports.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        debug!("Selected {:?} present mode", preferred);
        return preferred;
    }

    debug!("Selected FIFO present mode (vsync)");
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent (resolution).
///
/// A concrete current extent is used verbatim. The `u32::MAX` sentinel means
/// the surface adapts to the swapchain, so the framebuffer size is clamped
/// into the surface's min/max extents instead.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (requested: {}x{}, min: {}x{}, max: {}x{})",
        extent.width,
        extent.height,
        width,
        height,
        capabilities.min_image_extent.width,
        capabilities.min_image_extent.height,
        capabilities.max_image_extent.width,
        capabilities.max_image_extent.height
    );

    extent
}

/// Determines the number of swapchain images to request.
///
/// One more than the minimum, capped at the maximum when the surface sets one
/// (`max_image_count == 0` means unbounded).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Creates image views for swapchain images.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for &view in &image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn support(capabilities: vk::SurfaceCapabilitiesKHR) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities,
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                PREFERRED_SURFACE_FORMAT,
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_requires_matching_color_space() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_present_mode_prefers_requested() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];

        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::FIFO),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_present_mode_fallback_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];

        let selected = choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX);
        assert_eq!(selected, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };

        assert_eq!(choose_extent(&capabilities, 800, 600), extent(1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(100, 100),
            max_image_extent: extent(2000, 2000),
            ..Default::default()
        };

        assert_eq!(choose_extent(&capabilities, 3000, 3000), extent(2000, 2000));
        assert_eq!(choose_extent(&capabilities, 50, 50), extent(100, 100));
        assert_eq!(choose_extent(&capabilities, 800, 600), extent(800, 600));
    }

    #[test]
    fn test_determine_image_count() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);

        // 0 means no limit
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn test_negotiate_clamps_image_count_to_maximum() {
        let details = support(vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            current_extent: extent(800, 600),
            ..Default::default()
        });

        let config = negotiate(&details, (800, 600), vk::PresentModeKHR::MAILBOX).unwrap();
        assert_eq!(config.image_count, 2);
    }

    #[test]
    fn test_negotiate_adaptive_extent_uses_framebuffer_size() {
        let details = support(vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        });

        let config = negotiate(&details, (1920, 1080), vk::PresentModeKHR::MAILBOX).unwrap();
        assert_eq!(config.extent, extent(1920, 1080));
        assert_eq!(config.surface_format, PREFERRED_SURFACE_FORMAT);
        assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_negotiate_is_repeatable() {
        let details = support(vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 0,
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(2048, 2048),
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        });

        let first = negotiate(&details, (1280, 720), vk::PresentModeKHR::MAILBOX).unwrap();
        let second = negotiate(&details, (1280, 720), vk::PresentModeKHR::MAILBOX).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_negotiated_extent_within_bounds() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 4,
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(64, 64),
            max_image_extent: extent(1024, 768),
            ..Default::default()
        };
        let details = support(capabilities);

        for size in [(1, 1), (640, 480), (5000, 200), (200, 5000), (u32::MAX - 1, 3)] {
            let config = negotiate(&details, size, vk::PresentModeKHR::FIFO).unwrap();
            let e = config.extent;
            assert!((64..=1024).contains(&e.width), "{size:?} -> {e:?}");
            assert!((64..=768).contains(&e.height), "{size:?} -> {e:?}");
            assert!((2..=4).contains(&config.image_count));
        }
    }

    #[test]
    fn test_negotiate_rejects_inadequate_support() {
        let details = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(matches!(
            negotiate(&details, (800, 600), vk::PresentModeKHR::FIFO),
            Err(RhiError::SwapchainError(_))
        ));
    }
}
