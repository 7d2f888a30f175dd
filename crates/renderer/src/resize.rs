//! Swapchain rebuild.
//!
//! The chain is everything sized by the surface: swapchain, image views,
//! depth and multisample attachments, framebuffers. [`ResizeHandler`] tears
//! it down and recreates it through [`SwapchainChain`], and only rebuilds
//! the render pass and pipeline when the swapchain format changed.

use std::time::Duration;

use ash::vk;
use tracing::{debug, info};

use inflight_platform::{FramebufferSize, is_degenerate};

use crate::error::RendererResult;

/// Outcome of a rebuild attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The chain was recreated.
    Rebuilt { format_changed: bool },
    /// The framebuffer stayed zero-sized. Nothing was destroyed.
    Suspended,
}

/// Swapchain-dependent state the resize handler rebuilds.
pub trait SwapchainChain {
    /// Blocks until no queued work references the chain.
    fn wait_idle(&mut self) -> RendererResult<()>;

    /// Destroys framebuffers, attachments, then the swapchain and its views.
    fn destroy_chain(&mut self);

    /// Creates the swapchain and its image views for `size`, returning the
    /// negotiated color format.
    fn create_swapchain(&mut self, size: (u32, u32)) -> RendererResult<vk::Format>;

    /// Color format the render pass and pipeline were built for.
    fn pipeline_format(&self) -> vk::Format;

    /// Rebuilds render pass and pipeline for `format`.
    fn rebuild_pipeline(&mut self, format: vk::Format) -> RendererResult<()>;

    /// Creates attachments and framebuffers for the current swapchain.
    fn create_framebuffers(&mut self) -> RendererResult<()>;
}

/// Recreates a [`SwapchainChain`] when the surface changes.
#[derive(Clone, Copy, Debug)]
pub struct ResizeHandler {
    /// Longest a single rebuild waits for a non-degenerate size
    degenerate_wait: Duration,
}

impl Default for ResizeHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl ResizeHandler {
    /// Creates a handler that waits up to `degenerate_wait` per rebuild for
    /// a minimized window to come back.
    pub fn new(degenerate_wait: Duration) -> Self {
        Self { degenerate_wait }
    }

    /// Waits up to the configured bound for a non-degenerate framebuffer.
    ///
    /// Returns `None` while the window is still minimized.
    pub fn drawable_size<S>(&self, size_source: &S) -> Option<(u32, u32)>
    where
        S: FramebufferSize + ?Sized,
    {
        let size = size_source.wait_for_drawable_size(self.degenerate_wait);
        if is_degenerate(size) {
            debug!("Framebuffer is {}x{}, deferring swapchain creation", size.0, size.1);
            return None;
        }
        Some(size)
    }

    /// Rebuilds `chain` at the size reported by `size_source`.
    ///
    /// While the size is degenerate no swapchain is created and
    /// [`RebuildOutcome::Suspended`] is returned. The caller retries later.
    ///
    /// # Errors
    ///
    /// Returns the first error from the chain. A failed creation leaves the
    /// chain torn down.
    pub fn rebuild<C, S>(&self, chain: &mut C, size_source: &S) -> RendererResult<RebuildOutcome>
    where
        C: SwapchainChain + ?Sized,
        S: FramebufferSize + ?Sized,
    {
        let Some(size) = self.drawable_size(size_source) else {
            return Ok(RebuildOutcome::Suspended);
        };

        chain.wait_idle()?;
        chain.destroy_chain();

        let format = chain.create_swapchain(size)?;
        let format_changed = format != chain.pipeline_format();
        if format_changed {
            info!(
                "Swapchain format changed {:?} -> {:?}, rebuilding pipeline",
                chain.pipeline_format(),
                format
            );
            chain.rebuild_pipeline(format)?;
        }
        chain.create_framebuffers()?;

        info!("Swapchain rebuilt at {}x{}", size.0, size.1);
        Ok(RebuildOutcome::Rebuilt { format_changed })
    }
}
