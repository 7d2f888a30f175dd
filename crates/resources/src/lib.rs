//! Resource loading and management.
//!
//! This crate produces the CPU-side data the renderer uploads:
//! - Mesh data for the static quad or an OBJ model
//! - Decoded RGBA8 texture pixels, or a procedural fallback
//! - [`GeometrySource`] selecting between the geometry strategies at runtime

mod error;

pub mod geometry;
pub mod mesh;
pub mod obj;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use geometry::GeometrySource;
pub use mesh::MeshData;
pub use texture::TextureData;
