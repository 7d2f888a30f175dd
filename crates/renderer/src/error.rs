//! Renderer error types.

use thiserror::Error;

use inflight_resources::ResourceError;
use inflight_rhi::RhiError;

/// Errors that end the frame loop.
///
/// Stale or suboptimal swapchains are not errors. They surface as
/// [`AcquireOutcome`](crate::frame::AcquireOutcome) and
/// [`PresentOutcome`](crate::frame::PresentOutcome) and are routed to the
/// resize handler.
#[derive(Error, Debug)]
pub enum RendererError {
    /// A Vulkan call or RAII constructor failed
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Geometry or texture loading failed
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Window or surface error from the platform layer
    #[error(transparent)]
    Platform(#[from] inflight_core::Error),

    /// A frame-slot fence did not signal in time
    #[error("Device lost: fence for frame slot {slot} not signaled within {timeout_ns} ns")]
    DeviceLost { slot: usize, timeout_ns: u64 },

    /// A swapchain-dependent resource was used while the chain was torn down
    #[error("Swapchain resources missing: {0}")]
    MissingSwapchain(&'static str),

    /// Invalid renderer settings
    #[error("Invalid renderer configuration: {0}")]
    Config(String),
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = std::result::Result<T, RendererError>;
