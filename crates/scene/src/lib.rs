//! Scene state for the renderer.
//!
//! This crate provides:
//! - A fixed look-at camera in Vulkan clip conventions
//! - The time-driven model spin

pub mod camera;
pub mod transform;

pub use camera::{Camera, aspect_ratio};
pub use transform::Spin;
