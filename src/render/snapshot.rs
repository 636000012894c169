use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{LiveSeriesStore, SeriesId, SeriesSnapshot, SyncHandle};
use crate::error::{LiveError, LiveResult};

/// Consistent, lock-free view of one or more series for a draw pass.
///
/// Series that share a [`SyncHandle`] are captured while that handle is held
/// once, so they always reflect the same instant: no series is ever one tick
/// ahead of another. Series on different handles are captured one group after
/// another without any cross-group guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    series: IndexMap<SeriesId, SeriesSnapshot>,
    lock_groups: usize,
}

impl RenderSnapshot {
    /// Captures `stores` in the given order. A store listed twice is
    /// captured once.
    pub fn capture<'a, I>(stores: I) -> Self
    where
        I: IntoIterator<Item = &'a LiveSeriesStore>,
    {
        let mut groups: Vec<(&SyncHandle, Vec<&LiveSeriesStore>)> = Vec::new();
        for store in stores {
            match groups
                .iter_mut()
                .find(|(handle, _)| handle.same_as(store.handle()))
            {
                Some((_, members)) => members.push(store),
                None => groups.push((store.handle(), vec![store])),
            }
        }

        let mut series = IndexMap::new();
        for (handle, members) in &groups {
            // One acquisition per group; the per-store snapshots re-enter it.
            let _surface = handle.lock();
            for store in members {
                series
                    .entry(store.id())
                    .or_insert_with(|| store.snapshot());
            }
        }

        debug!(
            series = series.len(),
            lock_groups = groups.len(),
            "captured render snapshot"
        );
        Self {
            series,
            lock_groups: groups.len(),
        }
    }

    /// Per-series versions in capture order.
    #[must_use]
    pub fn versions(&self) -> Vec<u64> {
        self.series.values().map(SeriesSnapshot::version).collect()
    }

    #[must_use]
    pub fn version_of(&self, series_id: SeriesId) -> Option<u64> {
        self.series.get(&series_id).map(SeriesSnapshot::version)
    }

    #[must_use]
    pub fn series(&self, series_id: SeriesId) -> Option<&SeriesSnapshot> {
        self.series.get(&series_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesSnapshot> {
        self.series.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    #[must_use]
    pub fn total_points(&self) -> usize {
        self.series.values().map(SeriesSnapshot::len).sum()
    }

    /// Number of distinct handles that were locked to build this snapshot.
    #[must_use]
    pub fn lock_groups(&self) -> usize {
        self.lock_groups
    }

    /// `true` when a single handle covered every captured series.
    #[must_use]
    pub fn is_jointly_consistent(&self) -> bool {
        self.lock_groups <= 1
    }

    /// Overall min/max of every captured primary value.
    #[must_use]
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.series
            .values()
            .filter_map(SeriesSnapshot::value_bounds)
            .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)))
    }

    pub fn validate(&self) -> LiveResult<()> {
        for snapshot in self.series.values() {
            for point in snapshot.points() {
                point.validate()?;
            }
        }
        Ok(())
    }

    /// Serializes the snapshot as pretty JSON for fixture-based checks.
    pub fn to_json_pretty(&self) -> LiveResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LiveError::InvalidData(format!("failed to serialize snapshot: {e}")))
    }
}
