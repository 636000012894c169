use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LiveError, LiveResult};

/// Built-in mutation applied once per update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationPolicy {
    /// Appends one random point; the series grows without bound (or up to
    /// the store capacity).
    AppendOnly,
    /// Removes the head point, then appends one random point. The length
    /// stays constant once the series is non-empty.
    RemoveOldestThenAppend,
    /// Appends the latest value plus a bounded random step, clamped to the
    /// configured value range.
    RandomWalkAppend,
}

/// Update-loop configuration supplied at start.
///
/// This type is serializable so hosts can persist/load streaming setups
/// without inventing their own format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateLoopConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    #[serde(default = "default_policy")]
    pub policy: MutationPolicy,
    /// The store is topped up to this many points when the loop starts.
    #[serde(default)]
    pub initial_point_count: usize,
    #[serde(default = "default_value_range")]
    pub value_range: (f64, f64),
    #[serde(default = "default_random_walk_step")]
    pub random_walk_step: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// The run completes by itself after this many cycles.
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

impl Default for UpdateLoopConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            policy: default_policy(),
            initial_point_count: 0,
            value_range: default_value_range(),
            random_walk_step: default_random_walk_step(),
            seed: None,
            max_cycles: None,
        }
    }
}

impl UpdateLoopConfig {
    /// Creates a config with default generation settings.
    ///
    /// The period has millisecond resolution; a sub-millisecond remainder is
    /// rounded up, so any non-zero `period` yields a valid config.
    #[must_use]
    pub fn new(period: Duration, policy: MutationPolicy) -> Self {
        Self {
            period_ms: u64::try_from(period.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX),
            policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    #[must_use]
    pub fn with_initial_point_count(mut self, count: usize) -> Self {
        self.initial_point_count = count;
        self
    }

    /// Sets the range generated values are drawn from (and walks are clamped to).
    #[must_use]
    pub fn with_value_range(mut self, min: f64, max: f64) -> Self {
        self.value_range = (min, max);
        self
    }

    #[must_use]
    pub fn with_random_walk_step(mut self, step: f64) -> Self {
        self.random_walk_step = step;
        self
    }

    /// Makes generated values reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    pub fn validate(&self) -> LiveResult<()> {
        if self.period_ms == 0 {
            return Err(LiveError::InvalidConfig(
                "update period must be > 0 ms".to_owned(),
            ));
        }
        let (min, max) = self.value_range;
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(LiveError::InvalidConfig(
                "value range must be finite with min <= max".to_owned(),
            ));
        }
        if !self.random_walk_step.is_finite() || self.random_walk_step < 0.0 {
            return Err(LiveError::InvalidConfig(
                "random walk step must be finite and >= 0".to_owned(),
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(LiveError::InvalidConfig(
                "max cycles must be > 0 when set".to_owned(),
            ));
        }
        Ok(())
    }

    /// Parses a JSON config and validates it.
    pub fn from_json_str(input: &str) -> LiveResult<Self> {
        let config: Self = serde_json::from_str(input)
            .map_err(|e| LiveError::InvalidConfig(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> LiveResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LiveError::InvalidConfig(format!("failed to serialize config: {e}")))
    }
}

fn default_period_ms() -> u64 {
    1_000
}

fn default_policy() -> MutationPolicy {
    MutationPolicy::RemoveOldestThenAppend
}

fn default_value_range() -> (f64, f64) {
    (0.0, 10.0)
}

fn default_random_walk_step() -> f64 {
    1.0
}
