use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::SeriesId;
use crate::error::{LiveError, LiveResult};

/// Change notifications emitted by a live series.
///
/// Every variant carries the store version produced by the mutation, so
/// observers fed from several threads can order events themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesEvent {
    Appended {
        series_id: SeriesId,
        version: u64,
        len: usize,
        evicted: bool,
    },
    Removed {
        series_id: SeriesId,
        version: u64,
        index: usize,
        len: usize,
    },
    Replaced {
        series_id: SeriesId,
        version: u64,
        index: usize,
    },
    Cleared {
        series_id: SeriesId,
        version: u64,
    },
    Reset {
        series_id: SeriesId,
        version: u64,
        len: usize,
    },
}

impl SeriesEvent {
    #[must_use]
    pub fn series_id(&self) -> SeriesId {
        match *self {
            Self::Appended { series_id, .. }
            | Self::Removed { series_id, .. }
            | Self::Replaced { series_id, .. }
            | Self::Cleared { series_id, .. }
            | Self::Reset { series_id, .. } => series_id,
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        match *self {
            Self::Appended { version, .. }
            | Self::Removed { version, .. }
            | Self::Replaced { version, .. }
            | Self::Cleared { version, .. }
            | Self::Reset { version, .. } => version,
        }
    }
}

/// Hook interface for code that reacts to series mutations.
///
/// Observers run on the mutating thread once it has fully released the
/// series handle. A mutation made while the caller (or an update loop cycle)
/// holds the handle is delivered when that outermost hold ends. Observers may
/// read or mutate the store.
pub trait SeriesObserver: Send + Sync {
    fn id(&self) -> &str;
    fn on_event(&self, event: &SeriesEvent);
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    entries: Mutex<Vec<Arc<dyn SeriesObserver>>>,
}

impl ObserverRegistry {
    pub(crate) fn register(&self, observer: Arc<dyn SeriesObserver>) -> LiveResult<()> {
        let observer_id = observer.id().to_owned();
        if observer_id.is_empty() {
            return Err(LiveError::InvalidData(
                "observer id must not be empty".to_owned(),
            ));
        }
        let mut entries = self.entries.lock();
        if entries.iter().any(|entry| entry.id() == observer_id) {
            return Err(LiveError::InvalidData(format!(
                "observer with id `{observer_id}` is already registered"
            )));
        }
        entries.push(observer);
        Ok(())
    }

    pub(crate) fn unregister(&self, observer_id: &str) -> bool {
        let mut entries = self.entries.lock();
        if let Some(position) = entries.iter().position(|entry| entry.id() == observer_id) {
            entries.remove(position);
            return true;
        }
        false
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Current observers, or `None` when nobody is subscribed.
    pub(crate) fn snapshot(&self) -> Option<Vec<Arc<dyn SeriesObserver>>> {
        // Observers may (un)subscribe from inside `on_event`.
        let entries = self.entries.lock();
        if entries.is_empty() {
            return None;
        }
        Some(entries.clone())
    }
}
