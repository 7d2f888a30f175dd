//! Depth and multisample render targets.
//!
//! This module handles the auxiliary attachments that live next to the
//! swapchain images:
//! - [`pick_depth_format`] probes candidate depth formats at runtime
//! - [`max_usable_sample_count`] derives the MSAA level from device limits
//! - [`FrameAttachments`] owns the depth image and the optional
//!   multisampled color image for one swapchain generation
//!
//! Attachments are sized to the swapchain extent and are rebuilt with it.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc};

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Returns the first candidate whose optimal tiling supports `features`.
///
/// `probe` reports the format properties of the physical device, usually
/// `vkGetPhysicalDeviceFormatProperties`.
///
/// # Errors
///
/// Returns [`RhiError::UnsupportedFormat`] if no candidate qualifies.
pub fn find_supported_format<F>(
    candidates: &[vk::Format],
    features: vk::FormatFeatureFlags,
    probe: F,
) -> RhiResult<vk::Format>
where
    F: Fn(vk::Format) -> vk::FormatProperties,
{
    candidates
        .iter()
        .copied()
        .find(|&format| probe(format).optimal_tiling_features.contains(features))
        .ok_or_else(|| {
            RhiError::UnsupportedFormat(format!(
                "none of {:?} supports {:?} with optimal tiling",
                candidates, features
            ))
        })
}

/// Picks the depth attachment format from [`DEPTH_FORMAT_CANDIDATES`].
///
/// # Errors
///
/// Returns [`RhiError::UnsupportedFormat`] if the device supports none.
pub fn pick_depth_format<F>(probe: F) -> RhiResult<vk::Format>
where
    F: Fn(vk::Format) -> vk::FormatProperties,
{
    let format = find_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        probe,
    )?;
    debug!("Selected depth format {:?}", format);
    Ok(format)
}

/// Highest sample count usable for both color and depth framebuffers.
pub fn max_usable_sample_count(limits: &vk::PhysicalDeviceLimits) -> vk::SampleCountFlags {
    let counts =
        limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;

    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|&count| counts.contains(count))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Depth and optional MSAA color attachments for one swapchain generation.
pub struct FrameAttachments {
    depth: Image,
    color: Option<Image>,
    samples: vk::SampleCountFlags,
}

impl FrameAttachments {
    /// Allocates the attachments for `extent`.
    ///
    /// A multisampled color image in `color_format` is created only when
    /// `samples` is above one. The depth image always uses `samples`.
    ///
    /// # Errors
    ///
    /// Returns an error if an image cannot be created.
    pub fn new(
        device: Arc<Device>,
        extent: vk::Extent2D,
        color_format: vk::Format,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RhiResult<Self> {
        let color = if samples != vk::SampleCountFlags::TYPE_1 {
            Some(Image::new(
                device.clone(),
                &ImageDesc::attachment(
                    extent,
                    color_format,
                    samples,
                    vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                        | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                ),
                "msaa_color",
            )?)
        } else {
            None
        };

        let depth = Image::new(
            device,
            &ImageDesc::attachment(
                extent,
                depth_format,
                samples,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ),
            "depth",
        )?;

        info!(
            "Created frame attachments: {}x{}, depth {:?}, samples {:?}",
            extent.width, extent.height, depth_format, samples
        );

        Ok(Self {
            depth,
            color,
            samples,
        })
    }

    /// Depth image view.
    #[inline]
    pub fn depth_view(&self) -> vk::ImageView {
        self.depth.view()
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth.format()
    }

    /// Multisampled color view, if MSAA is active.
    #[inline]
    pub fn color_view(&self) -> Option<vk::ImageView> {
        self.color.as_ref().map(Image::view)
    }

    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.depth.extent()
    }
}
