//! Per-frame draw scheduling.
//!
//! The loop never waits on its own: it asks an injected [`FrameScheduler`] for
//! the next frame boundary and runs one draw when the host fires that handle.

use std::sync::Arc;

use winit::window::Window;

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Host frame-pacing capability (one callback per display refresh).
pub trait FrameScheduler {
    /// Request a callback at the next frame boundary.
    fn request_frame(&mut self) -> FrameHandle;

    /// Invalidate a requested callback. Unknown or fired handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Handles whose frame boundary has arrived, in request order.
    fn take_due(&mut self) -> Vec<FrameHandle>;

    /// Requested callbacks that have not fired or been cancelled.
    fn pending(&self) -> usize;
}

/// Bookkeeping shared by schedulers: issued handles awaiting their frame.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Vec<FrameHandle>,
}

impl FrameQueue {
    pub fn push(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending.push(handle);
        handle
    }

    pub fn cancel(&mut self, handle: FrameHandle) {
        self.pending.retain(|h| *h != handle);
    }

    pub fn drain(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Scheduler stepped explicitly by the caller; every pending handle is due.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    queue: FrameQueue,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.queue.push()
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.queue.cancel(handle);
    }

    fn take_due(&mut self) -> Vec<FrameHandle> {
        self.queue.drain()
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Scheduler backed by winit redraw requests. Pending handles fire when the
/// host receives `WindowEvent::RedrawRequested` and calls `take_due`.
pub struct WindowScheduler {
    window: Arc<Window>,
    queue: FrameQueue,
}

impl WindowScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            queue: FrameQueue::default(),
        }
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.window.request_redraw();
        self.queue.push()
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        // A redraw may still arrive; with nothing pending it is a no-op.
        self.queue.cancel(handle);
    }

    fn take_due(&mut self) -> Vec<FrameHandle> {
        self.queue.drain()
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Idle/Running controller holding at most one live frame callback.
pub struct RenderLoop<S: FrameScheduler> {
    scheduler: S,
    handle: Option<FrameHandle>,
    frames: u64,
}

impl<S: FrameScheduler> RenderLoop<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            handle: None,
            frames: 0,
        }
    }

    /// Schedule the recurring callback, replacing a live one.
    pub fn start(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel_frame(handle);
        }
        self.handle = Some(self.scheduler.request_frame());
    }

    /// Cancel the pending callback. No-op when idle.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Draws performed since construction.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Live callbacks held by the scheduler.
    pub fn active_callbacks(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn take_due(&mut self) -> Vec<FrameHandle> {
        self.scheduler.take_due()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Run the callback for `fired`: one draw, then reschedule.
    ///
    /// Returns `Ok(false)` without drawing when `fired` is not the live handle
    /// (it was cancelled or replaced). The next frame is requested even when the
    /// draw fails; callers decide whether to stop.
    pub fn tick<E>(
        &mut self,
        fired: FrameHandle,
        draw: impl FnOnce() -> Result<(), E>,
    ) -> Result<bool, E> {
        if self.handle != Some(fired) {
            return Ok(false);
        }
        self.handle = None;
        let result = draw();
        self.frames += 1;
        self.handle = Some(self.scheduler.request_frame());
        result.map(|()| true)
    }
}
