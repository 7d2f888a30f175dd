//! Time-driven model transform.
//!
//! The mesh spins about a fixed axis at a constant angular speed. The model
//! matrix is a pure function of elapsed wall-clock time, so frames recorded
//! out of order still agree on where the mesh was at a given instant.
//!
//! # Example
//!
//! ```
//! use inflight_scene::Spin;
//! use glam::Vec3;
//!
//! let spin = Spin::default();
//! let quarter_turn = spin.model_matrix(1.0);
//!
//! // After one second +X has rotated onto +Y
//! let x = quarter_turn.transform_vector3(Vec3::X);
//! assert!((x - Vec3::Y).length() < 1e-5);
//! ```

use glam::{Mat4, Quat, Vec3};

/// Constant-speed rotation about an axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spin {
    /// Normalized rotation axis
    axis: Vec3,
    /// Angular speed in degrees per second
    degrees_per_second: f32,
}

impl Default for Spin {
    /// A quarter turn per second about +Z.
    fn default() -> Self {
        Self {
            axis: Vec3::Z,
            degrees_per_second: 90.0,
        }
    }
}

impl Spin {
    /// Creates a spin about `axis`. A zero axis falls back to +Z.
    pub fn new(axis: Vec3, degrees_per_second: f32) -> Self {
        Self {
            axis: axis.try_normalize().unwrap_or(Vec3::Z),
            degrees_per_second,
        }
    }

    /// Rotation axis.
    #[inline]
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    /// Angular speed in degrees per second.
    #[inline]
    pub fn degrees_per_second(&self) -> f32 {
        self.degrees_per_second
    }

    /// Rotation angle in radians after `elapsed_secs`.
    pub fn angle(&self, elapsed_secs: f32) -> f32 {
        (elapsed_secs * self.degrees_per_second).to_radians()
    }

    /// Model matrix after `elapsed_secs`.
    pub fn model_matrix(&self, elapsed_secs: f32) -> Mat4 {
        Mat4::from_quat(Quat::from_axis_angle(self.axis, self.angle(elapsed_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_starts_at_identity() {
        let spin = Spin::default();
        assert!(spin.model_matrix(0.0).abs_diff_eq(Mat4::IDENTITY, EPSILON));
    }

    #[test]
    fn test_full_turn_after_four_seconds() {
        let spin = Spin::default();
        assert!(spin.model_matrix(4.0).abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn test_axis_is_preserved() {
        let spin = Spin::default();
        let m = spin.model_matrix(0.37);
        assert!((m.transform_vector3(Vec3::Z) - Vec3::Z).length() < EPSILON);
    }

    #[test]
    fn test_zero_axis_falls_back() {
        let spin = Spin::new(Vec3::ZERO, 45.0);
        assert_eq!(spin.axis(), Vec3::Z);
        assert_eq!(spin.degrees_per_second(), 45.0);
    }

    #[test]
    fn test_axis_is_normalized() {
        let spin = Spin::new(Vec3::new(0.0, 3.0, 0.0), 90.0);
        assert_eq!(spin.axis(), Vec3::Y);
    }
}
