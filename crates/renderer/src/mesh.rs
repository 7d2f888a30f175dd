//! Device-local mesh buffers.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use inflight_resources::MeshData;
use inflight_rhi::buffer::{Buffer, BufferUsage};
use inflight_rhi::command::{CommandBuffer, CommandPool};
use inflight_rhi::device::Device;
use inflight_rhi::upload::upload_buffer;

use crate::error::RendererResult;

/// Vertex and index buffers for one mesh.
pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl GpuMesh {
    /// Uploads `mesh` through staging buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is not drawable or an upload fails.
    pub fn upload(
        device: &Arc<Device>,
        pool: &CommandPool,
        mesh: &MeshData,
    ) -> RendererResult<Self> {
        mesh.validate("mesh")?;

        let vertex_buffer = upload_buffer(device, pool, BufferUsage::Vertex, mesh.vertex_bytes())?;
        let index_buffer = upload_buffer(device, pool, BufferUsage::Index, mesh.index_bytes())?;

        debug!(
            "Uploaded mesh: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    /// Binds both buffers and draws every index once.
    pub fn draw(&self, cmd: &CommandBuffer) {
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);
        cmd.draw_indexed(self.index_count, 1, 0, 0, 0);
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
