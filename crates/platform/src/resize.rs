//! Framebuffer size notifications.
//!
//! The window event handler publishes every new framebuffer size into a
//! [`FramebufferSignal`]. The renderer reads it when rebuilding the
//! swapchain and, while the window is minimized, blocks on it until a
//! non-degenerate size arrives or a timeout passes.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// Source of the current drawable size in physical pixels.
pub trait FramebufferSize {
    /// Most recently observed framebuffer size.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Blocks until the size is non-degenerate or `timeout` elapses, then
    /// returns the latest size, which may still be degenerate.
    fn wait_for_drawable_size(&self, timeout: Duration) -> (u32, u32);
}

/// Returns true if either dimension is zero.
#[inline]
pub fn is_degenerate((width, height): (u32, u32)) -> bool {
    width == 0 || height == 0
}

#[derive(Debug)]
struct SizeState {
    size: (u32, u32),
}

/// Shared, cloneable framebuffer size cell with change notification.
#[derive(Clone, Debug)]
pub struct FramebufferSignal {
    inner: Arc<(Mutex<SizeState>, Condvar)>,
}

impl FramebufferSignal {
    /// Creates a signal holding `initial`.
    pub fn new(initial: (u32, u32)) -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(SizeState { size: initial }),
                Condvar::new(),
            )),
        }
    }

    /// Publishes a new framebuffer size and wakes any waiter.
    pub fn notify(&self, width: u32, height: u32) {
        let (lock, condvar) = &*self.inner;
        let mut state = Self::lock(lock);
        state.size = (width, height);
        trace!("Framebuffer size {}x{}", width, height);
        condvar.notify_all();
    }

    // A panicking notifier cannot leave the size half-written
    fn lock(lock: &Mutex<SizeState>) -> MutexGuard<'_, SizeState> {
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FramebufferSize for FramebufferSignal {
    fn framebuffer_size(&self) -> (u32, u32) {
        Self::lock(&self.inner.0).size
    }

    fn wait_for_drawable_size(&self, timeout: Duration) -> (u32, u32) {
        let (lock, condvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut state = Self::lock(lock);

        while is_degenerate(state.size) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = condvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }

        state.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_degenerate_sizes() {
        assert!(is_degenerate((0, 600)));
        assert!(is_degenerate((800, 0)));
        assert!(is_degenerate((0, 0)));
        assert!(!is_degenerate((1, 1)));
    }

    #[test]
    fn test_notify_updates_size() {
        let signal = FramebufferSignal::new((800, 600));
        assert_eq!(signal.framebuffer_size(), (800, 600));

        signal.notify(1024, 768);
        assert_eq!(signal.framebuffer_size(), (1024, 768));
        assert_eq!(signal.clone().framebuffer_size(), (1024, 768));
    }

    #[test]
    fn test_wait_returns_immediately_for_drawable_size() {
        let signal = FramebufferSignal::new((640, 480));
        let size = signal.wait_for_drawable_size(Duration::from_secs(10));
        assert_eq!(size, (640, 480));
    }

    #[test]
    fn test_wait_times_out_while_minimized() {
        let signal = FramebufferSignal::new((0, 0));
        let started = Instant::now();
        let size = signal.wait_for_drawable_size(Duration::from_millis(20));
        assert_eq!(size, (0, 0));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_wakes_on_restore() {
        let signal = FramebufferSignal::new((0, 0));
        let notifier = signal.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            notifier.notify(0, 300);
            notifier.notify(400, 300);
        });

        let size = signal.wait_for_drawable_size(Duration::from_secs(10));
        handle.join().unwrap();
        assert_eq!(size, (400, 300));
    }
}
