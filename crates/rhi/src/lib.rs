//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides RAII wrappers over Vulkan using the `ash` crate.
//! It handles:
//! - Instance, physical device selection and logical device creation
//! - Swapchain negotiation and management
//! - Command buffer recording and one-time submissions
//! - Buffers, staging uploads, images, textures and attachments
//! - Render passes, framebuffers and pipeline creation
//! - Synchronization primitives

mod error;

pub mod attachment;
pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod upload;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
