//! The per-frame state machine.
//!
//! [`FrameOrchestrator`] owns nothing but counters. Every GPU effect goes
//! through a [`FrameBackend`], so the ordering rules below can be checked
//! against an in-memory backend without a device.
//!
//! # Frame order
//!
//! For slot `s = counter mod K`:
//!
//! ```text
//! 1. wait_for_slot(s)      fence of s signaled, its last use retired
//! 2. acquire_image(s)      OutOfDate -> rebuild, nothing else touched
//! 3. reset_slot(s)         fence + command buffer, only after a usable acquire
//! 4. update_uniforms(s)    s's uniform buffer, not read by the GPU (see 1)
//! 5. record(s, image)
//! 6. submit(s)             waits image-acquired, signals rendering-finished + fence
//! 7. present(s, image)     stale, suboptimal or resize flag -> rebuild
//! 8. counter += 1
//! ```
//!
//! Synchronization objects belong to the slot, never to the swapchain image:
//! acquisition order does not follow image index, so per-image semaphores
//! could be signaled twice before a wait.

use tracing::{debug, trace};

use crate::error::{RendererError, RendererResult};
use crate::resize::RebuildOutcome;

/// Result of asking the swapchain for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. `suboptimal` requests a rebuild after present.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// What one call to [`FrameOrchestrator::draw_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was submitted and presented from `slot`.
    Presented { slot: usize, image_index: u32 },
    /// The swapchain was rebuilt. `presented` is true when a frame went out
    /// before the rebuild.
    Rebuilt { presented: bool },
    /// The framebuffer is zero-sized. Nothing was drawn and the rebuild is
    /// retried on the next call.
    Suspended,
}

/// GPU side of a frame, addressed by frame slot.
pub trait FrameBackend {
    /// Blocks until the slot's fence is signaled.
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Acquires the next swapchain image, signaling the slot's
    /// image-acquired semaphore.
    fn acquire_image(&mut self, slot: usize) -> RendererResult<AcquireOutcome>;

    /// Resets the slot's fence and command buffer.
    fn reset_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Rewrites the slot's uniform buffer.
    fn update_uniforms(&mut self, slot: usize) -> RendererResult<()>;

    /// Records the draw into the slot's command buffer.
    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()>;

    /// Submits the slot's command buffer to the graphics queue.
    fn submit(&mut self, slot: usize) -> RendererResult<()>;

    /// Queues `image_index` for presentation after the slot's
    /// rendering-finished semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome>;

    /// Tears down and recreates the swapchain chain.
    fn rebuild_swapchain(&mut self) -> RendererResult<RebuildOutcome>;
}

/// Frame slot `counter mod frames_in_flight`.
#[inline]
pub fn slot_for(frame_counter: u64, frames_in_flight: usize) -> usize {
    (frame_counter % frames_in_flight as u64) as usize
}

/// Drives [`FrameBackend`] through one frame at a time.
#[derive(Debug)]
pub struct FrameOrchestrator {
    /// K
    frames_in_flight: usize,
    /// Frames submitted so far
    frame_counter: u64,
    /// Set by the window when its size changes
    resize_requested: bool,
    /// A rebuild was cut short by a zero-sized framebuffer
    rebuild_pending: bool,
}

impl FrameOrchestrator {
    /// Creates an orchestrator for `frames_in_flight` slots.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::Config`] if `frames_in_flight` is zero.
    pub fn new(frames_in_flight: usize) -> RendererResult<Self> {
        if frames_in_flight == 0 {
            return Err(RendererError::Config(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            frames_in_flight,
            frame_counter: 0,
            resize_requested: false,
            rebuild_pending: false,
        })
    }

    /// Number of frame slots.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Frames submitted so far.
    #[inline]
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        slot_for(self.frame_counter, self.frames_in_flight)
    }

    /// Flags an external resize. Honored after the next present.
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    /// Makes the next [`draw_frame`](Self::draw_frame) build the swapchain
    /// chain before touching any slot. Used when the window had no drawable
    /// size at startup.
    pub fn defer_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    /// True while a rebuild is waiting for a non-degenerate framebuffer.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.rebuild_pending
    }

    /// Runs one frame.
    ///
    /// # Errors
    ///
    /// Any backend error is fatal and returned unchanged. Stale swapchains
    /// are handled internally.
    pub fn draw_frame<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> RendererResult<FrameStatus> {
        if self.rebuild_pending {
            match self.rebuild(backend, false)? {
                FrameStatus::Suspended => return Ok(FrameStatus::Suspended),
                _ => trace!("Deferred rebuild completed"),
            }
        }

        let slot = self.current_slot();
        backend.wait_for_slot(slot)?;

        let (image_index, suboptimal) = match backend.acquire_image(slot)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date on acquire (slot {})", slot);
                return self.rebuild(backend, false);
            }
        };

        backend.reset_slot(slot)?;
        backend.update_uniforms(slot)?;
        backend.record(slot, image_index)?;
        backend.submit(slot)?;
        let presented = backend.present(slot, image_index)?;

        self.frame_counter += 1;

        let resize_requested = std::mem::take(&mut self.resize_requested);
        if suboptimal || presented != PresentOutcome::Presented || resize_requested {
            debug!(
                "Rebuilding after present (acquire suboptimal: {}, present: {:?}, resize: {})",
                suboptimal, presented, resize_requested
            );
            return self.rebuild(backend, true);
        }

        Ok(FrameStatus::Presented { slot, image_index })
    }

    fn rebuild<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        presented: bool,
    ) -> RendererResult<FrameStatus> {
        self.resize_requested = false;

        match backend.rebuild_swapchain()? {
            RebuildOutcome::Rebuilt { .. } => {
                self.rebuild_pending = false;
                Ok(FrameStatus::Rebuilt { presented })
            }
            RebuildOutcome::Suspended => {
                self.rebuild_pending = true;
                Ok(FrameStatus::Suspended)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_cycles_modulo_k() {
        for k in 1..=4 {
            for n in 0..20u64 {
                assert_eq!(slot_for(n, k), (n % k as u64) as usize);
            }
        }
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        assert!(matches!(
            FrameOrchestrator::new(0),
            Err(RendererError::Config(_))
        ));
    }

    #[test]
    fn test_new_orchestrator_starts_at_slot_zero() {
        let orchestrator = FrameOrchestrator::new(3).unwrap();
        assert_eq!(orchestrator.current_slot(), 0);
        assert_eq!(orchestrator.frame_counter(), 0);
        assert!(!orchestrator.is_suspended());
    }

    #[test]
    fn test_defer_rebuild_marks_suspended() {
        let mut orchestrator = FrameOrchestrator::new(2).unwrap();
        orchestrator.defer_rebuild();
        assert!(orchestrator.is_suspended());
        assert_eq!(orchestrator.frame_counter(), 0);
    }
}
