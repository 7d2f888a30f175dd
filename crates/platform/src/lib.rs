//! Platform layer for the renderer.
//!
//! This crate provides:
//! - Window management via winit
//! - Vulkan surface creation and ownership
//! - Framebuffer size notifications for swapchain rebuilds

mod resize;
mod window;

pub use resize::{FramebufferSignal, FramebufferSize, is_degenerate};
pub use window::{Surface, Window};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
