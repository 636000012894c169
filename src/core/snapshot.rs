use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{DataPoint, SeriesId};

/// Immutable point-in-time copy of one series.
///
/// The points live in their own allocation, so a snapshot stays valid and
/// unchanged after the store lock is released and the store keeps mutating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    series_id: SeriesId,
    name: String,
    version: u64,
    points: Arc<[DataPoint]>,
}

impl SeriesSnapshot {
    pub(crate) fn new(
        series_id: SeriesId,
        name: String,
        version: u64,
        points: Arc<[DataPoint]>,
    ) -> Self {
        Self {
            series_id,
            name,
            version,
            points,
        }
    }

    #[must_use]
    pub fn series_id(&self) -> SeriesId {
        self.series_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store version at capture time.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.value)
    }

    /// Min/max of the primary values, `None` for an empty snapshot.
    #[must_use]
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.values().fold(None, |bounds, value| match bounds {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
    }
}
