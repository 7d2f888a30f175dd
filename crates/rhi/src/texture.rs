//! Sampled textures with generated mip chains.
//!
//! Pixels are uploaded through a staging buffer into mip level 0, then each
//! lower level is produced by a linear blit from the level above it. The
//! whole chain ends in `SHADER_READ_ONLY_OPTIMAL`.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool, one_time_submit};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc, layout_transition, subresource_range};
use crate::instance::Instance;

/// Format every texture is stored in.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Number of mip levels for a `width` x `height` image: `floor(log2(max)) + 1`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Size of the next mip level, never below one texel.
#[inline]
pub fn next_mip_size(size: i32) -> i32 {
    if size > 1 { size / 2 } else { 1 }
}

/// Blit region producing `level` from `level - 1`, where the source level is
/// `src_width` x `src_height`.
pub fn mip_blit_region(level: u32, src_width: i32, src_height: i32) -> vk::ImageBlit {
    let layers = |mip_level| {
        vk::ImageSubresourceLayers::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .mip_level(mip_level)
            .base_array_layer(0)
            .layer_count(1)
    };

    vk::ImageBlit::default()
        .src_subresource(layers(level - 1))
        .src_offsets([
            vk::Offset3D { x: 0, y: 0, z: 0 },
            vk::Offset3D {
                x: src_width,
                y: src_height,
                z: 1,
            },
        ])
        .dst_subresource(layers(level))
        .dst_offsets([
            vk::Offset3D { x: 0, y: 0, z: 0 },
            vk::Offset3D {
                x: next_mip_size(src_width),
                y: next_mip_size(src_height),
                z: 1,
            },
        ])
}

/// Fails unless `properties` allow linear-filtered blits from optimal tiling.
///
/// # Errors
///
/// Returns [`RhiError::UnsupportedFormat`] when the feature is missing.
pub fn check_linear_blit(format: vk::Format, properties: vk::FormatProperties) -> RhiResult<()> {
    if properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    {
        Ok(())
    } else {
        Err(RhiError::UnsupportedFormat(format!(
            "{:?} does not support linear blitting for mipmap generation",
            format
        )))
    }
}

/// Sampled image with a full mip chain and its sampler.
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Uploads tightly packed RGBA8 `pixels` and generates the mip chain.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pixel buffer does not hold `width * height * 4` bytes
    /// - [`TEXTURE_FORMAT`] cannot be blitted with linear filtering
    /// - Any allocation, upload, or sampler creation fails
    pub fn from_rgba8(
        instance: &Instance,
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RhiError::InvalidArgument(format!(
                "Texture {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }

        check_linear_blit(
            TEXTURE_FORMAT,
            instance.format_properties(device.physical_device(), TEXTURE_FORMAT),
        )?;

        let mip_levels = mip_level_count(width, height);
        let extent = vk::Extent2D { width, height };
        let image = Image::new(
            device.clone(),
            &ImageDesc::texture(extent, TEXTURE_FORMAT, mip_levels),
            "texture",
        )?;

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;

        one_time_submit(&device, pool, |cmd| {
            let to_dst = layout_transition(
                image.handle(),
                subresource_range(vk::ImageAspectFlags::COLOR, 0, mip_levels),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )?;
            cmd.pipeline_barrier(to_dst.src_stage, to_dst.dst_stage, &[to_dst.barrier]);

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(0)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                });
            cmd.copy_buffer_to_image(
                staging.handle(),
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            record_mip_chain(cmd, image.handle(), extent, mip_levels)
        })?;

        let sampler = Sampler::new(device, mip_levels)?;

        info!(
            "Created texture: {}x{}, {} mip level(s)",
            width, height, mip_levels
        );

        Ok(Self { image, sampler })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.image.mip_levels()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

/// Blits every level from its parent and leaves all levels shader-readable.
///
/// Expects every level in `TRANSFER_DST_OPTIMAL` with level 0 filled.
fn record_mip_chain(
    cmd: &CommandBuffer,
    image: vk::Image,
    extent: vk::Extent2D,
    mip_levels: u32,
) -> RhiResult<()> {
    let mut width = extent.width as i32;
    let mut height = extent.height as i32;

    for level in 1..mip_levels {
        let parent = subresource_range(vk::ImageAspectFlags::COLOR, level - 1, 1);

        let to_src = layout_transition(
            image,
            parent,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )?;
        cmd.pipeline_barrier(to_src.src_stage, to_src.dst_stage, &[to_src.barrier]);

        cmd.blit_image(
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[mip_blit_region(level, width, height)],
            vk::Filter::LINEAR,
        );

        let to_read = layout_transition(
            image,
            parent,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;
        cmd.pipeline_barrier(to_read.src_stage, to_read.dst_stage, &[to_read.barrier]);

        width = next_mip_size(width);
        height = next_mip_size(height);
    }

    // The last level was only ever a blit destination
    let last = layout_transition(
        image,
        subresource_range(vk::ImageAspectFlags::COLOR, mip_levels - 1, 1),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;
    cmd.pipeline_barrier(last.src_stage, last.dst_stage, &[last.barrier]);

    debug!("Recorded mip chain with {} level(s)", mip_levels);
    Ok(())
}

/// Linear, repeating sampler covering a mip chain.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates a sampler for `mip_levels` levels.
    ///
    /// Anisotropic filtering is used at the device maximum when the device
    /// has it enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new(device: Arc<Device>, mip_levels: u32) -> RhiResult<Self> {
        let create_info = sampler_create_info(
            mip_levels,
            device
                .anisotropy_enabled()
                .then(|| device.limits().max_sampler_anisotropy),
        );

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };

        debug!("Created sampler for {} mip level(s)", mip_levels);

        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
        debug!("Destroyed sampler");
    }
}

/// Sampler state: linear filtering, repeat addressing, LOD over the chain.
pub fn sampler_create_info(
    mip_levels: u32,
    max_anisotropy: Option<f32>,
) -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(max_anisotropy.is_some())
        .max_anisotropy(max_anisotropy.unwrap_or(1.0))
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(512, 512), 10);
        assert_eq!(mip_level_count(512, 300), 10);
        assert_eq!(mip_level_count(1000, 10), 10);
        assert_eq!(mip_level_count(1024, 1), 11);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn test_next_mip_size_clamps_to_one() {
        assert_eq!(next_mip_size(512), 256);
        assert_eq!(next_mip_size(3), 1);
        assert_eq!(next_mip_size(1), 1);
    }

    #[test]
    fn test_mip_blit_region() {
        let blit = mip_blit_region(3, 64, 1);
        assert_eq!(blit.src_subresource.mip_level, 2);
        assert_eq!(blit.dst_subresource.mip_level, 3);
        assert_eq!(blit.src_offsets[1].x, 64);
        assert_eq!(blit.src_offsets[1].y, 1);
        assert_eq!(blit.dst_offsets[1].x, 32);
        assert_eq!(blit.dst_offsets[1].y, 1);
        assert_eq!(blit.dst_offsets[1].z, 1);
    }

    #[test]
    fn test_linear_blit_check() {
        let supported = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE
                | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ..Default::default()
        };
        assert!(check_linear_blit(TEXTURE_FORMAT, supported).is_ok());

        let unsupported = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE,
            ..Default::default()
        };
        assert!(matches!(
            check_linear_blit(TEXTURE_FORMAT, unsupported),
            Err(RhiError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_sampler_create_info() {
        let info = sampler_create_info(10, Some(16.0));
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 16.0);
        assert_eq!(info.max_lod, 10.0);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);

        let plain = sampler_create_info(1, None);
        assert_eq!(plain.anisotropy_enable, vk::FALSE);
        assert_eq!(plain.max_anisotropy, 1.0);
    }
}
