//! Frame loop for the renderer.
//!
//! This crate orchestrates the rendering process:
//! - Frame slots and the acquire / record / submit / present state machine
//! - Swapchain rebuilds on resize and stale surfaces
//! - The Vulkan context both of them drive

pub mod context;
mod error;
pub mod frame;
pub mod frame_slots;
pub mod mesh;
pub mod renderer;
pub mod resize;
pub mod ubo;

pub use error::{RendererError, RendererResult};
pub use frame::{AcquireOutcome, FrameBackend, FrameOrchestrator, FrameStatus, PresentOutcome};
pub use renderer::Renderer;
pub use resize::{RebuildOutcome, ResizeHandler, SwapchainChain};
