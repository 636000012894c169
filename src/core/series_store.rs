use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::core::{DataPoint, SeriesId, SeriesSnapshot, SyncHandle};
use crate::error::{LiveError, LiveResult};
use crate::extensions::{ObserverRegistry, SeriesEvent, SeriesObserver};

/// Ordered, thread-safe series of data points that is mutated while it is
/// being rendered.
///
/// Every structural change runs inside a short critical section on the
/// store's [`SyncHandle`] and bumps the version exactly once, so a reader
/// either sees the state before a mutation or after it, never in between.
/// Readers take a [`SeriesSnapshot`] and iterate it without holding any lock.
///
/// Cloning a store yields another handle to the same series.
#[derive(Clone)]
pub struct LiveSeriesStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    id: SeriesId,
    name: String,
    handle: SyncHandle,
    // Only ever locked while `handle` is held.
    state: Mutex<SeriesState>,
    observers: ObserverRegistry,
}

#[derive(Debug, Default)]
struct SeriesState {
    points: VecDeque<DataPoint>,
    version: u64,
    capacity: Option<usize>,
}

impl SeriesState {
    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn trim_to_capacity(&mut self) -> usize {
        let Some(capacity) = self.capacity else {
            return 0;
        };
        let excess = self.points.len().saturating_sub(capacity);
        self.points.drain(..excess);
        excess
    }

    fn check_index(&self, index: usize) -> LiveResult<()> {
        if index >= self.points.len() {
            return Err(LiveError::OutOfRange {
                index,
                len: self.points.len(),
            });
        }
        Ok(())
    }
}

/// Builder for stores that need a shared handle, a capacity or seed data.
#[derive(Debug)]
pub struct LiveSeriesStoreBuilder {
    name: String,
    handle: Option<SyncHandle>,
    capacity: Option<usize>,
    points: Vec<DataPoint>,
}

impl LiveSeriesStoreBuilder {
    /// Puts the store on an existing (usually surface-wide) handle.
    #[must_use]
    pub fn handle(mut self, handle: SyncHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Keeps at most `capacity` points; appends past it evict the oldest.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    #[must_use]
    pub fn points<I>(mut self, points: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<DataPoint>,
    {
        self.points.extend(points.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> LiveResult<LiveSeriesStore> {
        if self.capacity == Some(0) {
            return Err(LiveError::InvalidConfig(
                "series capacity must be > 0".to_owned(),
            ));
        }
        for point in &self.points {
            point.validate()?;
        }
        let mut state = SeriesState {
            points: self.points.into(),
            version: 0,
            capacity: self.capacity,
        };
        state.trim_to_capacity();

        Ok(LiveSeriesStore {
            inner: Arc::new(StoreInner {
                id: SeriesId::next(),
                name: self.name,
                handle: self.handle.unwrap_or_default(),
                state: Mutex::new(state),
                observers: ObserverRegistry::default(),
            }),
        })
    }
}

impl LiveSeriesStore {
    /// Creates an empty store with its own private handle.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_handle(name, SyncHandle::new())
    }

    /// Creates an empty store guarded by `handle`.
    #[must_use]
    pub fn with_handle(name: impl Into<String>, handle: SyncHandle) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: SeriesId::next(),
                name: name.into(),
                handle,
                state: Mutex::new(SeriesState::default()),
                observers: ObserverRegistry::default(),
            }),
        }
    }

    #[must_use]
    pub fn builder(name: impl Into<String>) -> LiveSeriesStoreBuilder {
        LiveSeriesStoreBuilder {
            name: name.into(),
            handle: None,
            capacity: None,
            points: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SeriesId {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The handle serializing this store's mutations and snapshots.
    ///
    /// Holding it makes a sequence of store calls atomic for every reader.
    #[must_use]
    pub fn handle(&self) -> &SyncHandle {
        &self.inner.handle
    }

    /// Returns `true` when both values refer to the same series.
    #[must_use]
    pub fn same_series(&self, other: &LiveSeriesStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Appends `point` at the tail and returns the new version.
    ///
    /// With a capacity configured, a full store evicts its oldest point in
    /// the same mutation.
    pub fn append(&self, point: impl Into<DataPoint>) -> LiveResult<u64> {
        let point = point.into();
        point.validate()?;
        self.mutate(|state, series_id| {
            state.points.push_back(point);
            let evicted = state.trim_to_capacity() > 0;
            let version = state.bump();
            trace!(
                series = series_id.get(),
                len = state.points.len(),
                version,
                evicted,
                "append point"
            );
            let event = SeriesEvent::Appended {
                series_id,
                version,
                len: state.points.len(),
                evicted,
            };
            Ok((version, Some(event)))
        })
    }

    /// Appends every point as one mutation. Nothing is appended when any
    /// point is invalid; an empty batch leaves the version unchanged.
    pub fn extend<I>(&self, points: I) -> LiveResult<u64>
    where
        I: IntoIterator,
        I::Item: Into<DataPoint>,
    {
        let points: Vec<DataPoint> = points.into_iter().map(Into::into).collect();
        for point in &points {
            point.validate()?;
        }
        self.mutate(|state, series_id| {
            if points.is_empty() {
                return Ok((state.version, None));
            }
            let added = points.len();
            state.points.extend(points);
            let evicted = state.trim_to_capacity() > 0;
            let version = state.bump();
            debug!(
                series = series_id.get(),
                added,
                len = state.points.len(),
                version,
                "extend points"
            );
            let event = SeriesEvent::Appended {
                series_id,
                version,
                len: state.points.len(),
                evicted,
            };
            Ok((version, Some(event)))
        })
    }

    /// Removes the head point. Returns `None` without touching the version
    /// when the store is empty.
    pub fn remove_oldest(&self) -> Option<DataPoint> {
        let removed = self.mutate(|state, series_id| {
            let Some(point) = state.points.pop_front() else {
                return Ok((None, None));
            };
            let version = state.bump();
            trace!(
                series = series_id.get(),
                len = state.points.len(),
                version,
                "remove oldest point"
            );
            let event = SeriesEvent::Removed {
                series_id,
                version,
                index: 0,
                len: state.points.len(),
            };
            Ok((Some(point), Some(event)))
        });
        removed.unwrap_or_default()
    }

    /// Removes the point at `index`; fails with `OutOfRange` outside
    /// `[0, len)` and leaves the store unchanged.
    pub fn remove_at(&self, index: usize) -> LiveResult<DataPoint> {
        self.mutate(|state, series_id| {
            state.check_index(index)?;
            let point = state
                .points
                .remove(index)
                .ok_or(LiveError::OutOfRange {
                    index,
                    len: state.points.len(),
                })?;
            let version = state.bump();
            trace!(series = series_id.get(), index, version, "remove point");
            let event = SeriesEvent::Removed {
                series_id,
                version,
                index,
                len: state.points.len(),
            };
            Ok((point, Some(event)))
        })
    }

    /// Replaces the point at `index` and returns the previous one.
    pub fn replace(&self, index: usize, point: impl Into<DataPoint>) -> LiveResult<DataPoint> {
        let point = point.into();
        point.validate()?;
        self.mutate(|state, series_id| {
            state.check_index(index)?;
            let previous = std::mem::replace(&mut state.points[index], point);
            let version = state.bump();
            trace!(series = series_id.get(), index, version, "replace point");
            let event = SeriesEvent::Replaced {
                series_id,
                version,
                index,
            };
            Ok((previous, Some(event)))
        })
    }

    /// Empties the store. The version advances once even if it was empty.
    pub fn clear(&self) -> u64 {
        let version = self.mutate(|state, series_id| {
            state.points.clear();
            let version = state.bump();
            debug!(series = series_id.get(), version, "clear points");
            Ok((version, Some(SeriesEvent::Cleared { series_id, version })))
        });
        version.unwrap_or_default()
    }

    /// Replaces the whole contents as one mutation.
    pub fn set_points<I>(&self, points: I) -> LiveResult<u64>
    where
        I: IntoIterator,
        I::Item: Into<DataPoint>,
    {
        let points: VecDeque<DataPoint> = points.into_iter().map(Into::into).collect();
        for point in &points {
            point.validate()?;
        }
        self.mutate(|state, series_id| {
            let original_count = points.len();
            state.points = points;
            state.trim_to_capacity();
            let version = state.bump();
            debug!(
                series = series_id.get(),
                original_count,
                len = state.points.len(),
                version,
                "set points"
            );
            let event = SeriesEvent::Reset {
                series_id,
                version,
                len: state.points.len(),
            };
            Ok((version, Some(event)))
        })
    }

    /// Changes the retention limit; shrinking trims the oldest points as one
    /// mutation.
    pub fn set_capacity(&self, capacity: Option<usize>) -> LiveResult<()> {
        if capacity == Some(0) {
            return Err(LiveError::InvalidConfig(
                "series capacity must be > 0".to_owned(),
            ));
        }
        self.mutate(|state, series_id| {
            state.capacity = capacity;
            if state.trim_to_capacity() == 0 {
                return Ok(((), None));
            }
            let version = state.bump();
            let event = SeriesEvent::Reset {
                series_id,
                version,
                len: state.points.len(),
            };
            Ok(((), Some(event)))
        })
    }

    /// Copies the current contents and version under the handle.
    #[must_use]
    pub fn snapshot(&self) -> SeriesSnapshot {
        let _surface = self.inner.handle.lock();
        let state = self.inner.state.lock();
        let points: Arc<[DataPoint]> = state.points.iter().cloned().collect();
        SeriesSnapshot::new(self.inner.id, self.inner.name.clone(), state.version, points)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read(|state| state.points.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.read(|state| state.version)
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.read(|state| state.capacity)
    }

    #[must_use]
    pub fn latest(&self) -> Option<DataPoint> {
        self.read(|state| state.points.back().cloned())
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<DataPoint> {
        self.read(|state| state.points.get(index).cloned())
    }

    /// Registers an observer with a unique identifier.
    pub fn subscribe(&self, observer: Arc<dyn SeriesObserver>) -> LiveResult<()> {
        self.inner.observers.register(observer)
    }

    /// Unregisters an observer by id. Returns `true` when removed.
    pub fn unsubscribe(&self, observer_id: &str) -> bool {
        self.inner.observers.unregister(observer_id)
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    fn read<T>(&self, f: impl FnOnce(&SeriesState) -> T) -> T {
        let _surface = self.inner.handle.lock();
        let state = self.inner.state.lock();
        f(&state)
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut SeriesState, SeriesId) -> LiveResult<(T, Option<SeriesEvent>)>,
    ) -> LiveResult<T> {
        let surface = self.inner.handle.lock();
        let mut state = self.inner.state.lock();
        let (result, event) = f(&mut state, self.inner.id)?;
        drop(state);
        if let Some(event) = event {
            if let Some(observers) = self.inner.observers.snapshot() {
                surface.defer(Box::new(move || {
                    for observer in observers {
                        observer.on_event(&event);
                    }
                }));
            }
        }
        Ok(result)
    }
}

impl fmt::Debug for LiveSeriesStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSeriesStore")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("handle", &self.inner.handle)
            .finish_non_exhaustive()
    }
}
