//! End-of-Frame Scheduler
//!
//! [`FrameScheduler`] runs one-shot continuations at the end of the current
//! frame, after all rendering for that frame has been queued. The host owns
//! the scheduler and calls [`FrameScheduler::end_of_frame`] once per frame;
//! widgets only hold a shared handle, so a continuation still fires when the
//! widget that submitted it has been deactivated.
//!
//! Continuations submitted while the queue is being drained are deferred to
//! the next frame boundary.

use std::cell::{Cell, RefCell};
use std::fmt;

type Continuation = Box<dyn FnOnce()>;

/// Single-threaded queue of end-of-frame continuations.
#[derive(Default)]
pub struct FrameScheduler {
    frame: Cell<u64>,
    pending: RefCell<Vec<Continuation>>,
}

impl FrameScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `continuation` for the end of the current frame.
    pub fn submit(&self, continuation: impl FnOnce() + 'static) {
        self.pending.borrow_mut().push(Box::new(continuation));
    }

    /// Runs every continuation queued so far and advances the frame counter.
    ///
    /// Returns the number of continuations executed.
    pub fn end_of_frame(&self) -> usize {
        let due = std::mem::take(&mut *self.pending.borrow_mut());
        let count = due.len();
        for continuation in due {
            continuation();
        }
        self.frame.set(self.frame.get() + 1);
        if count > 0 {
            log::trace!("Frame {}: ran {count} end-of-frame continuation(s)", self.frame.get());
        }
        count
    }

    /// Number of completed frames.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame.get()
    }

    /// Number of continuations waiting for the next frame boundary.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("frame", &self.frame.get())
            .field("pending", &self.pending_count())
            .finish()
    }
}
