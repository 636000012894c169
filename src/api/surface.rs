use parking_lot::RwLock;
use tracing::debug;

use crate::core::{LiveSeriesStore, SeriesId, SyncHandle};
use crate::error::{LiveError, LiveResult};
use crate::render::{RenderSnapshot, Renderer};

/// One visual surface: every series drawn on it shares one [`SyncHandle`], so
/// a capture always sees all of them at the same instant.
#[derive(Debug)]
pub struct LiveSurface {
    name: String,
    handle: SyncHandle,
    series: RwLock<Vec<LiveSeriesStore>>,
}

impl LiveSurface {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: SyncHandle::new(),
            series: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn handle(&self) -> &SyncHandle {
        &self.handle
    }

    /// Creates an empty series on this surface.
    pub fn add_series(&self, name: impl Into<String>) -> LiveSeriesStore {
        let store = LiveSeriesStore::with_handle(name, self.handle.clone());
        debug!(surface = %self.name, series = store.name(), "add series");
        self.series.write().push(store.clone());
        store
    }

    /// Adds an existing series. It must have been built on this surface's
    /// handle.
    pub fn attach(&self, store: LiveSeriesStore) -> LiveResult<()> {
        if !store.handle().same_as(&self.handle) {
            return Err(LiveError::InvalidState(format!(
                "series `{}` is not guarded by surface `{}`",
                store.name(),
                self.name
            )));
        }
        let mut series = self.series.write();
        if series.iter().any(|entry| entry.same_series(&store)) {
            return Err(LiveError::InvalidData(format!(
                "series `{}` is already attached to surface `{}`",
                store.name(),
                self.name
            )));
        }
        series.push(store);
        Ok(())
    }

    /// Detaches a series by id. Returns `true` when removed.
    pub fn detach(&self, series_id: SeriesId) -> bool {
        let mut series = self.series.write();
        if let Some(position) = series.iter().position(|entry| entry.id() == series_id) {
            series.remove(position);
            return true;
        }
        false
    }

    #[must_use]
    pub fn series(&self) -> Vec<LiveSeriesStore> {
        self.series.read().clone()
    }

    #[must_use]
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }

    /// Captures every series of the surface under one lock acquisition.
    #[must_use]
    pub fn capture(&self) -> RenderSnapshot {
        let series = self.series();
        RenderSnapshot::capture(&series)
    }

    /// Captures, releases the lock, then hands the frame to `renderer`.
    pub fn render<R: Renderer>(&self, renderer: &mut R) -> LiveResult<RenderSnapshot> {
        let frame = self.capture();
        renderer.render(&frame)?;
        Ok(frame)
    }
}
