use crossbeam_channel::{Receiver, Sender};
use tracing::trace;

/// Work item handed to a dispatcher.
pub type DispatchJob = Box<dyn FnOnce() + Send + 'static>;

/// "Run this on the render thread" capability supplied by the host.
///
/// The series lock never depends on which thread runs a job; dispatchers
/// only decide where redraw work executes.
pub trait RenderDispatcher: Send + Sync {
    fn dispatch(&self, job: DispatchJob);
}

impl<F> RenderDispatcher for F
where
    F: Fn(DispatchJob) + Send + Sync,
{
    fn dispatch(&self, job: DispatchJob) {
        self(job)
    }
}

/// Runs every job immediately on the dispatching thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl RenderDispatcher for ImmediateDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        job();
    }
}

/// Queues jobs until the render thread drains them with
/// [`QueuedDispatcher::run_pending`].
#[derive(Debug, Clone)]
pub struct QueuedDispatcher {
    tx: Sender<DispatchJob>,
    rx: Receiver<DispatchJob>,
}

impl Default for QueuedDispatcher {
    fn default() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }
}

impl QueuedDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Runs every queued job on the calling thread and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "drained dispatched jobs");
        }
        ran
    }
}

impl RenderDispatcher for QueuedDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(job);
    }
}
