//! Main renderer orchestration.
//!
//! [`Renderer`] pairs the frame state machine with the Vulkan context it
//! drives. The window layer only calls [`Renderer::draw_frame`] and
//! [`Renderer::request_resize`].

use ash::vk;
use tracing::{info, warn};

use inflight_core::Config;
use inflight_platform::{FramebufferSignal, FramebufferSize, Window};

use crate::context::RenderContext;
use crate::error::RendererResult;
use crate::frame::{FrameOrchestrator, FrameStatus};

/// Renders the configured mesh into a window.
///
/// # Example
///
/// ```no_run
/// use inflight_core::Config;
/// use inflight_platform::{FramebufferSignal, Window};
/// use inflight_renderer::{FrameStatus, Renderer};
///
/// # fn example(window: &Window) -> Result<(), inflight_renderer::RendererError> {
/// let signal = FramebufferSignal::new(window.framebuffer_size());
/// let mut renderer = Renderer::new(window, signal.clone(), &Config::default())?;
///
/// // On every redraw
/// match renderer.draw_frame()? {
///     FrameStatus::Suspended => { /* wait for the next resize event */ }
///     _ => window.request_redraw(),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Renderer {
    orchestrator: FrameOrchestrator,
    context: RenderContext,
}

impl Renderer {
    /// Creates the renderer for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if any GPU object or asset cannot be created.
    pub fn new(window: &Window, size: FramebufferSignal, config: &Config) -> RendererResult<Self> {
        let (width, height) = size.framebuffer_size();
        info!("Initializing renderer ({}x{})", width, height);

        let mut orchestrator = FrameOrchestrator::new(config.renderer.frames_in_flight)?;
        let context = RenderContext::new(window, size, config)?;
        if !context.has_swapchain() {
            orchestrator.defer_rebuild();
        }

        Ok(Self {
            orchestrator,
            context,
        })
    }

    /// Draws one frame.
    ///
    /// # Errors
    ///
    /// Errors are fatal. Out-of-date swapchains are rebuilt internally.
    pub fn draw_frame(&mut self) -> RendererResult<FrameStatus> {
        self.orchestrator.draw_frame(&mut self.context)
    }

    /// Flags a window resize. The swapchain is rebuilt after the next present.
    pub fn request_resize(&mut self) {
        self.orchestrator.request_resize();
    }

    /// True while waiting for a minimized window to get a size again.
    pub fn is_suspended(&self) -> bool {
        self.orchestrator.is_suspended()
    }

    /// Frames submitted so far.
    pub fn frame_counter(&self) -> u64 {
        self.orchestrator.frame_counter()
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.context.extent()
    }

    /// Waits for all in-flight frames to retire.
    pub fn wait_idle(&self) {
        if let Err(e) = self.context.wait_idle() {
            warn!("Device wait idle failed: {}", e);
        }
    }
}
