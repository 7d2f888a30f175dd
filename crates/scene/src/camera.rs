//! Fixed look-at camera.

use glam::{Mat4, Vec3};

/// A camera looking from `eye` at `target`.
///
/// Projection follows Vulkan clip conventions: depth in `[0, 1]` and Y
/// pointing down in clip space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// World up direction
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip plane distance
    pub near: f32,
    /// Far clip plane distance
    pub far: f32,
}

impl Default for Camera {
    /// Looks from (2, 2, 2) at the origin with +Z up.
    fn default() -> Self {
        Self {
            eye: Vec3::splat(2.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_y: 45.0_f32.to_radians(),
            near: 0.1,
            far: 10.0,
        }
    }
}

impl Camera {
    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the projection matrix for `aspect` (with Vulkan Y-flip).
    ///
    /// A non-finite or non-positive aspect (zero-height extent) is treated
    /// as 1.0.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        let mut proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// Width over height, guarding against a zero height.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}
