use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::primitives::{datetime_to_unix_seconds, decimal_to_f64, ensure_finite};
use crate::error::LiveResult;

static SERIES_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a live series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesId(u64);

impl SeriesId {
    pub(crate) fn next() -> Self {
        Self(SERIES_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// One sample of a series.
///
/// `value` is the plotted quantity; `secondary` is an optional second
/// coordinate (typically time or an explicit x) and `label` an optional
/// category/identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DataPoint {
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self {
            value,
            secondary: None,
            label: None,
        }
    }

    /// Builds an explicit coordinate pair, `secondary` being the x coordinate.
    #[must_use]
    pub fn xy(x: f64, value: f64) -> Self {
        Self {
            value,
            secondary: Some(x),
            label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn from_decimal_time(time: DateTime<Utc>, price: Decimal) -> LiveResult<Self> {
        Ok(Self::xy(
            datetime_to_unix_seconds(time),
            decimal_to_f64(price, "price")?,
        ))
    }

    pub fn validate(&self) -> LiveResult<()> {
        ensure_finite(self.value, "point value")?;
        if let Some(secondary) = self.secondary {
            ensure_finite(secondary, "point secondary value")?;
        }
        Ok(())
    }
}

impl From<f64> for DataPoint {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}
