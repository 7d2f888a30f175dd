//! GPU image management.
//!
//! [`Image`] owns a 2D VkImage, its gpu-allocator memory, and a single view
//! covering every mip level. Depth buffers, multisampled color targets, and
//! textures are all built on it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inflight_rhi::device::Device;
//! use inflight_rhi::image::{Image, ImageDesc};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), inflight_rhi::RhiError> {
//! let depth = Image::new(
//!     device,
//!     &ImageDesc::attachment(
//!         vk::Extent2D { width: 1280, height: 720 },
//!         vk::Format::D32_SFLOAT,
//!         vk::SampleCountFlags::TYPE_1,
//!         vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
//!     ),
//!     "depth",
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Creation parameters for an [`Image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDesc {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
}

impl ImageDesc {
    /// Single-mip render target description.
    pub fn attachment(
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
        usage: vk::ImageUsageFlags,
    ) -> Self {
        Self {
            extent,
            format,
            mip_levels: 1,
            samples,
            usage,
        }
    }

    /// Sampled texture description with a full mip chain.
    ///
    /// The image is also a transfer source so lower mips can be blitted from
    /// higher ones.
    pub fn texture(extent: vk::Extent2D, format: vk::Format, mip_levels: u32) -> Self {
        Self {
            extent,
            format,
            mip_levels,
            samples: vk::SampleCountFlags::TYPE_1,
            usage: vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
        }
    }

    /// Aspect of the image view, derived from the format.
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        aspect_for_format(self.format)
    }
}

/// Device-local 2D image with a view.
///
/// Destruction order is view, then allocation, then image.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    desc: ImageDesc,
    name: &'static str,
}

impl Image {
    /// Creates an image, allocates device-local memory for it, and creates
    /// a view over all its mip levels.
    ///
    /// # Errors
    ///
    /// Returns an error if the extent is zero or any creation call fails.
    pub fn new(device: Arc<Device>, desc: &ImageDesc, name: &'static str) -> RhiResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(RhiError::InvalidArgument(format!(
                "{} image dimensions must be greater than 0",
                name
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(desc.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.lock_allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    // Optimal tiling is not linear
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut created = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            desc: *desc,
            name,
        };

        // Drop releases the image and memory if binding or view creation fails
        if let Some(allocation) = created.allocation.as_ref() {
            unsafe {
                created.device.handle().bind_image_memory(
                    image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(subresource_range(desc.aspect(), 0, desc.mip_levels));

        created.view = unsafe { created.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created {} image: {}x{} {:?}, {} mip(s), {:?}",
            name,
            desc.extent.width,
            desc.extent.height,
            desc.format,
            desc.mip_levels,
            desc.samples
        );

        Ok(created)
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the image view covering all mip levels.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the creation parameters.
    #[inline]
    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.desc.mip_levels
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} image allocation: {:?}", self.name, e);
                    }
                }
                Err(e) => error!("Leaking {} image allocation: {}", self.name, e),
            }
        }

        unsafe {
            self.device.handle().destroy_image(self.image, None);
        }

        debug!("Destroyed {} image", self.name);
    }
}

/// Returns the view aspect for `format`.
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT | vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D32_SFLOAT_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D16_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Returns true if `format` carries a stencil component.
pub fn has_stencil_component(format: vk::Format) -> bool {
    aspect_for_format(format).contains(vk::ImageAspectFlags::STENCIL)
}

/// Subresource range over `level_count` mips starting at `base_mip_level`.
pub fn subresource_range(
    aspect_mask: vk::ImageAspectFlags,
    base_mip_level: u32,
    level_count: u32,
) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect_mask)
        .base_mip_level(base_mip_level)
        .level_count(level_count)
        .base_array_layer(0)
        .layer_count(1)
}

/// A layout transition ready to be recorded with
/// [`CommandBuffer::pipeline_barrier`](crate::command::CommandBuffer::pipeline_barrier).
#[derive(Clone, Copy, Debug)]
pub struct LayoutTransition {
    pub barrier: vk::ImageMemoryBarrier<'static>,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Builds the barrier for a supported layout transition.
///
/// Supported transitions are the ones the upload paths use:
/// `UNDEFINED -> TRANSFER_DST_OPTIMAL`,
/// `TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL`,
/// `TRANSFER_DST_OPTIMAL -> TRANSFER_SRC_OPTIMAL` and
/// `TRANSFER_SRC_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL`.
///
/// # Errors
///
/// Returns [`RhiError::InvalidArgument`] for any other pair.
pub fn layout_transition(
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> RhiResult<LayoutTransition> {
    use vk::AccessFlags as A;
    use vk::ImageLayout as L;
    use vk::PipelineStageFlags as S;

    let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => {
            (A::empty(), A::TRANSFER_WRITE, S::TOP_OF_PIPE, S::TRANSFER)
        }
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            A::TRANSFER_WRITE,
            A::SHADER_READ,
            S::TRANSFER,
            S::FRAGMENT_SHADER,
        ),
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => {
            (A::TRANSFER_WRITE, A::TRANSFER_READ, S::TRANSFER, S::TRANSFER)
        }
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            A::TRANSFER_READ,
            A::SHADER_READ,
            S::TRANSFER,
            S::FRAGMENT_SHADER,
        ),
        _ => {
            return Err(RhiError::InvalidArgument(format!(
                "Unsupported image layout transition: {:?} -> {:?}",
                old_layout, new_layout
            )));
        }
    };

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    Ok(LayoutTransition {
        barrier,
        src_stage,
        dst_stage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_for_format() {
        assert_eq!(
            aspect_for_format(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            aspect_for_format(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_for_format(vk::Format::B8G8R8A8_SRGB),
            vk::ImageAspectFlags::COLOR
        );
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn test_texture_desc() {
        let desc = ImageDesc::texture(
            vk::Extent2D {
                width: 512,
                height: 256,
            },
            vk::Format::R8G8B8A8_SRGB,
            10,
        );
        assert_eq!(desc.mip_levels, 10);
        assert_eq!(desc.samples, vk::SampleCountFlags::TYPE_1);
        assert!(desc.usage.contains(
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED
        ));
        assert_eq!(desc.aspect(), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_upload_transitions() {
        let range = subresource_range(vk::ImageAspectFlags::COLOR, 0, 1);

        let to_dst = layout_transition(
            vk::Image::null(),
            range,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(to_dst.barrier.dst_access_mask, vk::AccessFlags::TRANSFER_WRITE);

        let to_read = layout_transition(
            vk::Image::null(),
            range,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        assert_eq!(to_read.barrier.dst_access_mask, vk::AccessFlags::SHADER_READ);
    }

    #[test]
    fn test_unsupported_transition_is_rejected() {
        let range = subresource_range(vk::ImageAspectFlags::COLOR, 0, 1);
        let result = layout_transition(
            vk::Image::null(),
            range,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert!(matches!(result, Err(RhiError::InvalidArgument(_))));
    }

    #[test]
    fn test_subresource_range() {
        let range = subresource_range(vk::ImageAspectFlags::COLOR, 3, 1);
        assert_eq!(range.base_mip_level, 3);
        assert_eq!(range.level_count, 1);
        assert_eq!(range.layer_count, 1);
    }
}
