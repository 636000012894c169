use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::core::{DataPoint, LiveSeriesStore};
use crate::error::LiveResult;

use super::{MutationPolicy, UpdateLoopConfig};

/// One cycle's worth of mutation against a store.
///
/// The update loop holds the store's handle while `apply` runs, so every
/// mutation made inside one call becomes visible to readers at once.
/// Returning an error halts the loop.
pub trait CyclePolicy: Send {
    fn apply(&mut self, store: &LiveSeriesStore, cycle: u64) -> LiveResult<()>;
}

impl<F> CyclePolicy for F
where
    F: FnMut(&LiveSeriesStore, u64) -> LiveResult<()> + Send,
{
    fn apply(&mut self, store: &LiveSeriesStore, cycle: u64) -> LiveResult<()> {
        self(store, cycle)
    }
}

/// Executes a [`MutationPolicy`] with values drawn from the configured range.
#[derive(Debug, Clone)]
pub struct BuiltinPolicy {
    policy: MutationPolicy,
    value_range: (f64, f64),
    random_walk_step: f64,
    rng: StdRng,
}

impl BuiltinPolicy {
    #[must_use]
    pub fn from_config(config: &UpdateLoopConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            policy: config.policy,
            value_range: config.value_range,
            random_walk_step: config.random_walk_step,
            rng,
        }
    }

    #[must_use]
    pub fn policy(&self) -> MutationPolicy {
        self.policy
    }

    /// Produces the next generated value, continuing from `latest` for walks.
    pub fn next_value(&mut self, latest: Option<f64>) -> f64 {
        let (min, max) = self.value_range;
        match (self.policy, latest) {
            (MutationPolicy::RandomWalkAppend, Some(latest)) => {
                let step = self.random_walk_step;
                (latest + self.rng.gen_range(-step..=step)).clamp(min, max)
            }
            (MutationPolicy::RandomWalkAppend, None) => min + (max - min) / 2.0,
            _ => self.rng.gen_range(min..=max),
        }
    }

    /// Tops `store` up to `target` points as one mutation and returns the
    /// number of points added.
    pub fn seed_store(&mut self, store: &LiveSeriesStore, target: usize) -> LiveResult<usize> {
        let _surface = store.handle().lock();
        let missing = target.saturating_sub(store.len());
        if missing == 0 {
            return Ok(0);
        }
        let mut latest = store.latest().map(|point| point.value);
        let mut points = Vec::with_capacity(missing);
        for _ in 0..missing {
            let value = self.next_value(latest);
            latest = Some(value);
            points.push(DataPoint::new(value));
        }
        store.extend(points)?;
        Ok(missing)
    }
}

impl CyclePolicy for BuiltinPolicy {
    fn apply(&mut self, store: &LiveSeriesStore, cycle: u64) -> LiveResult<()> {
        let _surface = store.handle().lock();
        match self.policy {
            MutationPolicy::AppendOnly => {
                let value = self.next_value(None);
                store.append(value)?;
            }
            MutationPolicy::RemoveOldestThenAppend => {
                store.remove_oldest();
                let value = self.next_value(None);
                store.append(value)?;
            }
            MutationPolicy::RandomWalkAppend => {
                let latest = store.latest().map(|point| point.value);
                let value = self.next_value(latest);
                store.append(value)?;
            }
        }
        trace!(
            cycle,
            series = store.id().get(),
            policy = ?self.policy,
            "applied builtin policy"
        );
        Ok(())
    }
}
