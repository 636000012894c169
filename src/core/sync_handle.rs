use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

/// Work queued while a handle is held, run once it is fully released.
pub(crate) type DeferredJob = Box<dyn FnOnce() + Send + 'static>;

/// Mutual-exclusion handle shared by every series that feeds one surface.
///
/// The lock is reentrant: a thread already holding it (for example an update
/// loop applying a multi-step cycle, or a joint capture) can call store
/// methods that lock it again. Clones share the same lock.
///
/// Jobs deferred through a [`SyncGuard`] run after the outermost guard of the
/// holding thread is dropped, never while the lock is held.
#[derive(Clone, Default)]
pub struct SyncHandle {
    shared: Arc<HandleShared>,
}

#[derive(Default)]
struct HandleShared {
    lock: ReentrantMutex<()>,
    // Only touched by the thread holding `lock`.
    depth: AtomicUsize,
    deferred: Mutex<Vec<DeferredJob>>,
}

/// Proof that the current thread holds a [`SyncHandle`].
#[must_use = "the handle is released as soon as the guard is dropped"]
pub struct SyncGuard<'a> {
    shared: &'a HandleShared,
    guard: Option<ReentrantMutexGuard<'a, ()>>,
}

impl SyncHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the handle is held by the calling thread.
    pub fn lock(&self) -> SyncGuard<'_> {
        let guard = self.shared.lock.lock();
        SyncGuard::enter(&self.shared, guard)
    }

    /// Bounded variant of [`SyncHandle::lock`]; `None` on timeout.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<SyncGuard<'_>> {
        self.shared
            .lock
            .try_lock_for(timeout)
            .map(|guard| SyncGuard::enter(&self.shared, guard))
    }

    /// Returns `true` when both handles guard the same lock.
    #[must_use]
    pub fn same_as(&self, other: &SyncHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.shared.lock.is_locked()
    }

    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }
}

impl<'a> SyncGuard<'a> {
    fn enter(shared: &'a HandleShared, guard: ReentrantMutexGuard<'a, ()>) -> Self {
        shared.depth.fetch_add(1, Ordering::AcqRel);
        Self {
            shared,
            guard: Some(guard),
        }
    }

    /// Queues `job` until the calling thread fully releases the handle.
    pub(crate) fn defer(&self, job: DeferredJob) {
        self.shared.deferred.lock().push(job);
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if self.shared.depth.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let deferred = std::mem::take(&mut *self.shared.deferred.lock());
        drop(self.guard.take());
        for job in deferred {
            job();
        }
    }
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("key", &format_args!("{:#x}", self.key()))
            .field("holders", &Arc::strong_count(&self.shared))
            .finish()
    }
}
