use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::LiveSeriesStore;
use crate::error::{LiveError, LiveResult};

use super::{BuiltinPolicy, CyclePolicy, RenderDispatcher, UpdateLoopConfig};

/// Lifecycle of an [`UpdateLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateLoopState {
    Idle,
    Running,
    /// Stop was requested; the worker exits at its next cycle boundary.
    Stopping,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopExit {
    Stopped,
    /// `max_cycles` was reached.
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSummary {
    pub run_id: u64,
    pub cycles: u64,
    pub exit: LoopExit,
}

type RedrawFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct RedrawHook {
    dispatcher: Arc<dyn RenderDispatcher>,
    redraw: RedrawFn,
}

struct LoopControl {
    state: UpdateLoopState,
    stop_tx: Option<Sender<()>>,
}

struct LoopShared {
    control: Mutex<LoopControl>,
    run_id: AtomicU64,
    cycles: AtomicU64,
    error: Mutex<Option<LiveError>>,
}

struct LoopWorker {
    run_id: u64,
    thread: JoinHandle<LoopSummary>,
}

/// Cancellable repeating task that mutates one store at a fixed period.
///
/// Each cycle applies the policy while holding the store's handle, then waits
/// for the period without holding it. `stop` is cooperative: a cycle that has
/// begun always completes. Starting again while a run is active stops and
/// joins that run first, so one `UpdateLoop` never drives two workers.
pub struct UpdateLoop {
    name: String,
    shared: Arc<LoopShared>,
    worker: Mutex<Option<LoopWorker>>,
    redraw: Option<RedrawHook>,
}

impl UpdateLoop {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(LoopShared {
                control: Mutex::new(LoopControl {
                    state: UpdateLoopState::Idle,
                    stop_tx: None,
                }),
                run_id: AtomicU64::new(0),
                cycles: AtomicU64::new(0),
                error: Mutex::new(None),
            }),
            worker: Mutex::new(None),
            redraw: None,
        }
    }

    /// Hands `redraw` to `dispatcher` after every completed cycle.
    #[must_use]
    pub fn with_redraw(
        mut self,
        dispatcher: Arc<dyn RenderDispatcher>,
        redraw: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.redraw = Some(RedrawHook {
            dispatcher,
            redraw: Arc::new(redraw),
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> UpdateLoopState {
        self.shared.control.lock().state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == UpdateLoopState::Running
    }

    /// Cycles completed by the current (or last) run.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }

    /// Identifier of the current (or last) run; 0 before the first start.
    #[must_use]
    pub fn run_id(&self) -> u64 {
        self.shared.run_id.load(Ordering::Acquire)
    }

    /// Starts the configured built-in policy against `store`.
    pub fn start(&self, store: LiveSeriesStore, config: UpdateLoopConfig) -> LiveResult<()> {
        config.validate()?;
        let policy = BuiltinPolicy::from_config(&config);
        self.start_with_policy(store, config, policy)
    }

    /// Starts a custom policy; `config.policy` is only used to generate the
    /// initial points.
    ///
    /// A previous run whose failure was never observed (through `wait` or
    /// `take_error`) is reported instead of starting: its `PolicyExecution`
    /// error, or `InvalidState` when its worker panicked. The loop stays
    /// `Idle` and the next call starts normally.
    pub fn start_with_policy<P>(
        &self,
        store: LiveSeriesStore,
        config: UpdateLoopConfig,
        policy: P,
    ) -> LiveResult<()>
    where
        P: CyclePolicy + 'static,
    {
        config.validate()?;

        self.request_stop();
        let mut worker = self.worker.lock();
        // Another start may have slipped in between the request and the lock.
        self.request_stop();
        if let Some(previous) = worker.take() {
            debug!(
                loop_name = %self.name,
                run_id = previous.run_id,
                "restarting update loop"
            );
            if previous.thread.join().is_err() {
                warn!(
                    loop_name = %self.name,
                    run_id = previous.run_id,
                    "previous update loop worker panicked; not restarting"
                );
                return Err(LiveError::InvalidState(format!(
                    "update loop `{}` worker panicked during run {}",
                    self.name, previous.run_id
                )));
            }
        }
        if let Some(err) = self.shared.error.lock().take() {
            warn!(
                loop_name = %self.name,
                error = %err,
                "previous update loop run failed; not restarting"
            );
            return Err(err);
        }

        if config.initial_point_count > 0 {
            BuiltinPolicy::from_config(&config).seed_store(&store, config.initial_point_count)?;
        }

        let run_id = self.shared.run_id.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.cycles.store(0, Ordering::Release);

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        {
            let mut control = self.shared.control.lock();
            control.state = UpdateLoopState::Running;
            control.stop_tx = Some(stop_tx);
        }

        let run = LoopRun {
            run_id,
            store,
            period: config.period(),
            max_cycles: config.max_cycles,
            stop_rx,
            shared: Arc::clone(&self.shared),
            redraw: self.redraw.clone(),
        };
        let thread = std::thread::Builder::new()
            .name(format!("update-loop-{}", self.name))
            .spawn(move || run.execute(policy))
            .map_err(|e| {
                let mut control = self.shared.control.lock();
                control.state = UpdateLoopState::Idle;
                control.stop_tx = None;
                LiveError::InvalidState(format!("failed to spawn update loop worker: {e}"))
            })?;

        info!(
            loop_name = %self.name,
            run_id,
            period_ms = config.period_ms,
            policy = ?config.policy,
            "update loop started"
        );
        *worker = Some(LoopWorker { run_id, thread });
        Ok(())
    }

    /// Requests cooperative cancellation. No-op unless running.
    pub fn stop(&self) {
        if self.request_stop() {
            debug!(loop_name = %self.name, "update loop stop requested");
        }
    }

    /// Blocks until the current run ends and reports how it ended.
    ///
    /// A run that failed returns its `PolicyExecution` error, unless the
    /// error was already taken with [`UpdateLoop::take_error`].
    pub fn wait(&self) -> LiveResult<LoopSummary> {
        let mut worker = self.worker.lock();
        let Some(current) = worker.take() else {
            return Err(LiveError::InvalidState(
                "update loop has no run to wait for".to_owned(),
            ));
        };
        let summary = current.thread.join().map_err(|_| {
            LiveError::InvalidState(format!(
                "update loop `{}` worker panicked during run {}",
                self.name, current.run_id
            ))
        })?;
        if summary.exit == LoopExit::Failed {
            if let Some(err) = self.shared.error.lock().take() {
                return Err(err);
            }
        }
        Ok(summary)
    }

    /// Stops the current run and waits for it to finish.
    pub fn stop_and_wait(&self) -> LiveResult<LoopSummary> {
        self.stop();
        self.wait()
    }

    /// Takes the error that halted the last run, if any.
    pub fn take_error(&self) -> Option<LiveError> {
        self.shared.error.lock().take()
    }

    fn request_stop(&self) -> bool {
        let mut control = self.shared.control.lock();
        if control.state != UpdateLoopState::Running {
            return false;
        }
        control.state = UpdateLoopState::Stopping;
        if let Some(stop_tx) = &control.stop_tx {
            // A full channel already carries a stop request.
            let _ = stop_tx.try_send(());
        }
        true
    }
}

impl Drop for UpdateLoop {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.thread.join();
        }
    }
}

impl fmt::Debug for UpdateLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateLoop")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("run_id", &self.run_id())
            .field("cycles", &self.cycles())
            .finish_non_exhaustive()
    }
}

struct LoopRun {
    run_id: u64,
    store: LiveSeriesStore,
    period: Duration,
    max_cycles: Option<u64>,
    stop_rx: Receiver<()>,
    shared: Arc<LoopShared>,
    redraw: Option<RedrawHook>,
}

impl LoopRun {
    fn execute<P: CyclePolicy>(self, mut policy: P) -> LoopSummary {
        let _idle = IdleOnExit {
            shared: Arc::clone(&self.shared),
            run_id: self.run_id,
        };

        let mut cycle = 0_u64;
        let exit = loop {
            let applied = {
                let _surface = self.store.handle().lock();
                policy.apply(&self.store, cycle)
            };
            if let Err(source) = applied {
                warn!(
                    run_id = self.run_id,
                    cycle,
                    series = self.store.name(),
                    error = %source,
                    "mutation policy failed; halting update loop"
                );
                *self.shared.error.lock() = Some(LiveError::PolicyExecution {
                    cycle,
                    source: Box::new(source),
                });
                break LoopExit::Failed;
            }

            cycle += 1;
            self.shared.cycles.store(cycle, Ordering::Release);
            if let Some(hook) = &self.redraw {
                let redraw = Arc::clone(&hook.redraw);
                hook.dispatcher.dispatch(Box::new(move || redraw()));
            }

            if self.max_cycles.is_some_and(|max| cycle >= max) {
                break LoopExit::Completed;
            }
            match self.stop_rx.recv_timeout(self.period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break LoopExit::Stopped,
            }
        };

        debug!(run_id = self.run_id, cycles = cycle, exit = ?exit, "update loop finished");
        LoopSummary {
            run_id: self.run_id,
            cycles: cycle,
            exit,
        }
    }
}

/// Returns the loop to `Idle` when its worker exits, panics included.
struct IdleOnExit {
    shared: Arc<LoopShared>,
    run_id: u64,
}

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        if self.shared.run_id.load(Ordering::Acquire) != self.run_id {
            return;
        }
        let mut control = self.shared.control.lock();
        control.state = UpdateLoopState::Idle;
        control.stop_tx = None;
    }
}
