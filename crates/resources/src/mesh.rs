//! CPU-side mesh data.

use glam::{Vec2, Vec3};
use inflight_rhi::vertex::Vertex;

use crate::error::{ResourceError, ResourceResult};

/// Indexed triangle list ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Interleaved vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Creates mesh data from vertices and indices.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// A unit quad in the XY plane facing +Z, with a distinct color per
    /// corner and UVs covering the full texture.
    pub fn quad() -> Self {
        let vertices = vec![
            Vertex::new(
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec2::new(1.0, 0.0),
            ),
            Vertex::new(
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ),
            Vertex::new(
                Vec3::new(0.5, 0.5, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec2::new(0.0, 1.0),
            ),
            Vertex::new(
                Vec3::new(-0.5, 0.5, 0.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec2::new(1.0, 1.0),
            ),
        ];

        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }

    /// Number of indices to draw.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Checks that the mesh is drawable: at least one whole triangle and
    /// every index in range.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::EmptyMesh`] or
    /// [`ResourceError::IndexOutOfRange`].
    pub fn validate(&self, name: &str) -> ResourceResult<()> {
        if self.vertices.is_empty() || self.indices.len() < 3 {
            return Err(ResourceError::EmptyMesh(name.to_string()));
        }

        let vertex_count = self.vertices.len();
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(ResourceError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }

        Ok(())
    }

    /// Vertex bytes for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index bytes for upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_is_valid() {
        let quad = MeshData::quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.index_count(), 6);
        assert_eq!(quad.triangle_count(), 2);
        assert!(quad.validate("quad").is_ok());
    }

    #[test]
    fn test_upload_bytes() {
        let quad = MeshData::quad();
        assert_eq!(quad.vertex_bytes().len(), 4 * 32);
        assert_eq!(quad.index_bytes().len(), 6 * 4);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let mesh = MeshData::default();
        assert!(matches!(
            mesh.validate("empty"),
            Err(ResourceError::EmptyMesh(_))
        ));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut mesh = MeshData::quad();
        mesh.indices[4] = 9;
        assert!(matches!(
            mesh.validate("broken"),
            Err(ResourceError::IndexOutOfRange {
                index: 9,
                vertex_count: 4
            })
        ));
    }
}
