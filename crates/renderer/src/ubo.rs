//! Uniform buffer layout shared with `shaders/mesh.vert`.
//!
//! The structure uses `#[repr(C)]` and `Pod` so it can be written into the
//! mapped buffer as raw bytes. Three column-major `mat4`s need no padding
//! under std140.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use inflight_scene::{Camera, Spin, aspect_ratio};

/// Model, view, and projection matrices.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MvpUbo {
    /// Object to world space.
    pub model: Mat4,
    /// World to view space.
    pub view: Mat4,
    /// View to clip space, Y already flipped for Vulkan.
    pub proj: Mat4,
}

impl MvpUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a UBO from the three matrices.
    pub fn new(model: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self { model, view, proj }
    }

    /// Uniform state `elapsed_secs` into the run for a `width` x `height`
    /// target.
    pub fn animated(
        camera: &Camera,
        spin: &Spin,
        elapsed_secs: f32,
        width: u32,
        height: u32,
    ) -> Self {
        Self::new(
            spin.model_matrix(elapsed_secs),
            camera.view_matrix(),
            camera.projection_matrix(aspect_ratio(width, height)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_mvp_ubo_size() {
        // 3 Mat4 (3 * 64) = 192 bytes
        assert_eq!(MvpUbo::SIZE, 192);
    }

    #[test]
    fn test_mvp_ubo_alignment() {
        assert_eq!(std::mem::align_of::<MvpUbo>(), 16);
    }

    #[test]
    fn test_field_offsets() {
        assert_eq!(std::mem::offset_of!(MvpUbo, model), 0);
        assert_eq!(std::mem::offset_of!(MvpUbo, view), 64);
        assert_eq!(std::mem::offset_of!(MvpUbo, proj), 128);
    }

    #[test]
    fn test_animated_matches_scene() {
        let camera = Camera::default();
        let spin = Spin::default();

        let ubo = MvpUbo::animated(&camera, &spin, 0.5, 800, 600);

        assert_eq!(ubo.model, spin.model_matrix(0.5));
        assert_eq!(ubo.view, camera.view_matrix());
        assert_eq!(ubo.proj, camera.projection_matrix(800.0 / 600.0));
    }

    #[test]
    fn test_view_and_projection_are_fixed() {
        let camera = Camera::default();
        let spin = Spin::default();

        let early = MvpUbo::animated(&camera, &spin, 0.0, 800, 600);
        let late = MvpUbo::animated(&camera, &spin, 2.5, 800, 600);

        assert_eq!(early.view, late.view);
        assert_eq!(early.proj, late.proj);
        assert_ne!(early.model, late.model);
        assert_eq!(early.model.transform_vector3(Vec3::X), Vec3::X);
    }

    #[test]
    fn test_ubo_bytes() {
        let ubo = MvpUbo::default();
        let bytes: &[u8] = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), MvpUbo::SIZE);
    }
}
