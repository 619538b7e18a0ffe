//! Frame scheduling
//!
//! The render scheduler never drives its own loop. It asks a
//! [`FrameScheduler`] for one callback before the next paint, and the platform
//! calls [`RenderScheduler::on_frame`](crate::RenderScheduler::on_frame) when it
//! fires. At most one request is outstanding at a time.

use std::cell::RefCell;
use std::rc::Rc;

/// Handle to a requested frame callback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameTask(pub u64);

/// Platform hook: "run the frame callback before the next paint"
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameTask;

    fn cancel(&mut self, task: FrameTask);
}

#[derive(Debug, Default)]
struct ManualFramesInner {
    next_id: u64,
    pending: Option<FrameTask>,
    requested: usize,
    cancelled: usize,
}

/// Headless frame scheduler for tests and offscreen drivers
///
/// Requests are only recorded; the driver checks [`ManualFrames::take`] and
/// calls `on_frame` itself. Clones share state, so a driver can keep a handle
/// while the scheduler owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualFrames {
    inner: Rc<RefCell<ManualFramesInner>>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a frame has been requested and not yet taken or cancelled
    pub fn is_pending(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    /// Consume the pending request, if any
    pub fn take(&self) -> Option<FrameTask> {
        self.inner.borrow_mut().pending.take()
    }

    /// Total number of requests made so far
    pub fn requested(&self) -> usize {
        self.inner.borrow().requested
    }

    /// Total number of cancellations so far
    pub fn cancelled(&self) -> usize {
        self.inner.borrow().cancelled
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) -> FrameTask {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        inner.requested += 1;

        let task = FrameTask(inner.next_id);
        inner.pending = Some(task);
        task
    }

    fn cancel(&mut self, task: FrameTask) {
        let mut inner = self.inner.borrow_mut();
        if inner.pending == Some(task) {
            inner.pending = None;
            inner.cancelled += 1;
        }
    }
}
