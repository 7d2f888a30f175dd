//! Per-slot frame resources.
//!
//! Each of the K slots owns everything one in-flight frame touches: a
//! command buffer, two semaphores, a fence, a uniform buffer and the
//! descriptor set pointing at it. The descriptor pool is sized from the same
//! K, never from the swapchain image count.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on in_flight (CPU waits for previous use of this slot)
//! 2. Acquire swapchain image (signals image_available)
//! 3. Reset in_flight, reset and record command_buffer, write uniform
//! 4. Submit command_buffer:
//!    - Wait on image_available at COLOR_ATTACHMENT_OUTPUT
//!    - Signal render_finished
//!    - Signal in_flight
//! 5. Present (waits on render_finished)
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use inflight_rhi::buffer::{Buffer, BufferUsage};
use inflight_rhi::command::{CommandBuffer, CommandPool};
use inflight_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, buffer_info, image_info, mesh_pool_sizes, write_mesh_set,
};
use inflight_rhi::device::Device;
use inflight_rhi::sync::{Fence, Semaphore};
use inflight_rhi::texture::Texture;

use crate::error::{RendererError, RendererResult};
use crate::ubo::MvpUbo;

/// Descriptor pool shape for `frames_in_flight` slots: one set per slot.
pub fn descriptor_pool_shape(frames_in_flight: usize) -> (u32, [vk::DescriptorPoolSize; 2]) {
    let sets = frames_in_flight as u32;
    (sets, mesh_pool_sizes(sets))
}

/// Resources owned by one frame slot.
pub struct FrameSlot {
    command_buffer: CommandBuffer,
    image_available: Semaphore,
    render_finished: Semaphore,
    /// Created signaled so the first wait returns immediately
    in_flight: Fence,
    uniform: Buffer,
    descriptor_set: vk::DescriptorSet,
}

impl FrameSlot {
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }

    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Writes the uniform block for this slot.
    ///
    /// Only call once the slot's fence has been waited on.
    pub fn write_uniforms(&self, ubo: &MvpUbo) -> RendererResult<()> {
        self.uniform.write_data(0, bytemuck::bytes_of(ubo))?;
        Ok(())
    }
}

/// The ring of K frame slots.
///
/// Slots are declared before the pool so they drop first. Command buffers
/// are freed with their command pool, which outlives this struct.
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    descriptor_pool: DescriptorPool,
}

impl FrameSlots {
    /// Creates `frames_in_flight` slots whose descriptor sets bind a fresh
    /// uniform buffer and `texture`.
    ///
    /// # Errors
    ///
    /// Returns an error if `frames_in_flight` is zero or any creation fails.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        set_layout: &DescriptorSetLayout,
        texture: &Texture,
        frames_in_flight: usize,
    ) -> RendererResult<Self> {
        if frames_in_flight == 0 {
            return Err(RendererError::Config(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let (max_sets, pool_sizes) = descriptor_pool_shape(frames_in_flight);
        let descriptor_pool = DescriptorPool::new(device.clone(), max_sets, &pool_sizes)?;

        let layouts = vec![set_layout.handle(); frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;

        let mut slots = Vec::with_capacity(frames_in_flight);
        for (i, (command_buffer, descriptor_set)) in command_buffers
            .into_iter()
            .zip(descriptor_sets)
            .enumerate()
        {
            let uniform = Buffer::new(device.clone(), BufferUsage::Uniform, MvpUbo::SIZE as u64)?;
            write_mesh_set(
                &device,
                descriptor_set,
                buffer_info(uniform.handle(), 0, MvpUbo::SIZE as u64),
                image_info(
                    texture.sampler(),
                    texture.view(),
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ),
            );

            slots.push(FrameSlot {
                command_buffer,
                image_available: Semaphore::new(device.clone())?,
                render_finished: Semaphore::new(device.clone())?,
                in_flight: Fence::new(device.clone(), true)?,
                uniform,
                descriptor_set,
            });
            debug!("Created frame slot {}", i);
        }

        info!("Created {} frame slots", slots.len());

        Ok(Self {
            slots,
            descriptor_pool,
        })
    }

    /// Slot `index`, or `None` if out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    /// Number of slots (K).
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Descriptor sets the pool was sized for.
    #[inline]
    pub fn descriptor_set_capacity(&self) -> u32 {
        self.descriptor_pool.max_sets()
    }
}
