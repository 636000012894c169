use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{LiveError, LiveResult};

pub fn decimal_to_f64(value: Decimal, field_name: &str) -> LiveResult<f64> {
    value.to_f64().ok_or_else(|| {
        LiveError::InvalidData(format!("{field_name} cannot be represented as f64"))
    })
}

#[must_use]
pub fn datetime_to_unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

pub fn ensure_finite(value: f64, field_name: &str) -> LiveResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LiveError::InvalidData(format!("{field_name} must be finite")))
    }
}
