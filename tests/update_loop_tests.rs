use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use live_series::LiveError;
use live_series::api::{
    LoopExit, MutationPolicy, QueuedDispatcher, UpdateLoop, UpdateLoopConfig, UpdateLoopState,
};
use live_series::core::LiveSeriesStore;
use parking_lot::Mutex;

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn seeded_store() -> LiveSeriesStore {
    LiveSeriesStore::builder("values")
        .points([5.0, 10.0, 8.0, 4.0])
        .build()
        .expect("store")
}

#[test]
fn remove_oldest_then_append_cycle_shifts_window() {
    let store = seeded_store();
    let update_loop = UpdateLoop::new("toggle");
    let config = UpdateLoopConfig::new(
        Duration::from_millis(1_000),
        MutationPolicy::RemoveOldestThenAppend,
    )
    .with_seed(42)
    .with_max_cycles(1);

    update_loop.start(store.clone(), config).expect("start");
    let summary = update_loop.wait().expect("run completes");

    assert_eq!(summary.exit, LoopExit::Completed);
    assert_eq!(summary.cycles, 1);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 4);
    let values: Vec<f64> = snapshot.values().collect();
    assert_eq!(&values[..3], &[10.0, 8.0, 4.0]);
    assert!((0.0..=10.0).contains(&values[3]));
    assert_eq!(update_loop.state(), UpdateLoopState::Idle);
}

#[test]
fn remove_oldest_then_append_keeps_length_constant_while_streaming() {
    let store = seeded_store();
    let update_loop = UpdateLoop::new("streaming");
    let config =
        UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::RemoveOldestThenAppend);
    update_loop.start(store.clone(), config).expect("start");

    let deadline = Instant::now() + Duration::from_millis(100);
    while Instant::now() < deadline {
        assert_eq!(store.snapshot().len(), 4);
    }

    let summary = update_loop.stop_and_wait().expect("stop");
    assert_eq!(summary.exit, LoopExit::Stopped);
    assert!(summary.cycles >= 1);
    assert_eq!(store.len(), 4);
}

#[test]
fn stop_quiesces_the_store() {
    let store = LiveSeriesStore::new("append");
    let update_loop = UpdateLoop::new("append");
    let config = UpdateLoopConfig::new(Duration::from_millis(10), MutationPolicy::AppendOnly);
    update_loop.start(store.clone(), config).expect("start");

    assert!(wait_until(Duration::from_secs(5), || update_loop.cycles() >= 3));
    update_loop.stop();
    assert!(wait_until(Duration::from_secs(5), || {
        update_loop.state() == UpdateLoopState::Idle
    }));

    let len = store.len();
    let version = store.version();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(store.len(), len);
    assert_eq!(store.version(), version);
    assert_eq!(update_loop.wait().expect("stopped run").exit, LoopExit::Stopped);
}

#[test]
fn stop_transitions_through_stopping_to_idle() {
    let store = LiveSeriesStore::new("slow");
    let update_loop = UpdateLoop::new("slow");
    let entered = Arc::new(AtomicUsize::new(0));
    let policy = {
        let entered = Arc::clone(&entered);
        move |store: &LiveSeriesStore, _cycle: u64| {
            entered.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(200));
            store.append(1.0).map(|_| ())
        }
    };
    update_loop
        .start_with_policy(
            store.clone(),
            UpdateLoopConfig::new(Duration::from_millis(1_000), MutationPolicy::AppendOnly),
            policy,
        )
        .expect("start");

    assert!(wait_until(Duration::from_secs(5), || entered.load(Ordering::SeqCst) == 1));
    update_loop.stop();
    // The first cycle is still sleeping inside the policy.
    assert_eq!(update_loop.state(), UpdateLoopState::Stopping);

    let summary = update_loop.wait().expect("wait");
    assert_eq!(summary.cycles, 1);
    assert_eq!(store.len(), 1, "a begun cycle always completes");
    assert_eq!(update_loop.state(), UpdateLoopState::Idle);
}

#[test]
fn stop_when_idle_is_a_no_op() {
    let update_loop = UpdateLoop::new("idle");
    update_loop.stop();
    assert_eq!(update_loop.state(), UpdateLoopState::Idle);
    assert!(matches!(
        update_loop.wait(),
        Err(LiveError::InvalidState(_))
    ));
}

#[test]
fn rapid_double_start_leaves_exactly_one_active_loop() {
    let store = LiveSeriesStore::new("toggle");
    let update_loop = UpdateLoop::new("toggle");
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let config = UpdateLoopConfig::new(Duration::from_millis(5), MutationPolicy::AppendOnly);

    let tagged = |tag: &'static str| {
        let log = Arc::clone(&log);
        move |store: &LiveSeriesStore, cycle: u64| {
            log.lock().push(tag);
            store.append(cycle as f64).map(|_| ())
        }
    };

    update_loop
        .start_with_policy(store.clone(), config, tagged("first"))
        .expect("first start");
    update_loop
        .start_with_policy(store.clone(), config, tagged("second"))
        .expect("second start");

    thread::sleep(Duration::from_millis(60));
    let summary = update_loop.stop_and_wait().expect("stop");
    assert_eq!(summary.run_id, 2);
    assert_eq!(update_loop.run_id(), 2);

    let log = log.lock();
    let first_second = log
        .iter()
        .position(|tag| *tag == "second")
        .expect("second run cycled");
    assert!(
        log[first_second..].iter().all(|tag| *tag == "second"),
        "first run kept mutating after restart: {log:?}"
    );
    assert_eq!(store.len(), log.len());
}

#[test]
fn policy_failure_halts_loop_and_surfaces_error() {
    let store = LiveSeriesStore::new("failing");
    let update_loop = UpdateLoop::new("failing");
    let policy = |store: &LiveSeriesStore, cycle: u64| -> live_series::LiveResult<()> {
        if cycle == 2 {
            store.remove_at(99)?;
        }
        store.append(cycle as f64).map(|_| ())
    };

    update_loop
        .start_with_policy(
            store.clone(),
            UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::AppendOnly),
            policy,
        )
        .expect("start");

    let err = update_loop.wait().expect_err("policy error");
    match err {
        LiveError::PolicyExecution { cycle, source } => {
            assert_eq!(cycle, 2);
            assert!(matches!(*source, LiveError::OutOfRange { index: 99, len: 2 }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.len(), 2, "last completed mutation stays visible");
    assert_eq!(update_loop.cycles(), 2);
    assert_eq!(update_loop.state(), UpdateLoopState::Idle);
}

#[test]
fn failure_can_be_polled_without_blocking() {
    let store = LiveSeriesStore::new("poll");
    let update_loop = UpdateLoop::new("poll");
    let policy = |_store: &LiveSeriesStore, _cycle: u64| -> live_series::LiveResult<()> {
        Err(LiveError::InvalidData("sensor offline".to_owned()))
    };
    update_loop
        .start_with_policy(
            store,
            UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::AppendOnly),
            policy,
        )
        .expect("start");

    assert!(wait_until(Duration::from_secs(5), || {
        update_loop.state() == UpdateLoopState::Idle
    }));
    let err = update_loop.take_error().expect("error recorded");
    assert!(matches!(err, LiveError::PolicyExecution { cycle: 0, .. }));

    let summary = update_loop.wait().expect("error already taken");
    assert_eq!(summary.exit, LoopExit::Failed);
    assert_eq!(summary.cycles, 0);
}

#[test]
fn panicking_policy_reports_invalid_state_and_returns_to_idle() {
    let update_loop = UpdateLoop::new("panicky");
    let policy = |_store: &LiveSeriesStore, _cycle: u64| -> live_series::LiveResult<()> {
        panic!("policy bug");
    };
    update_loop
        .start_with_policy(
            LiveSeriesStore::new("panicky"),
            UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::AppendOnly),
            policy,
        )
        .expect("start");

    assert!(matches!(
        update_loop.wait(),
        Err(LiveError::InvalidState(_))
    ));
    assert_eq!(update_loop.state(), UpdateLoopState::Idle);
}

#[test]
fn invalid_config_is_rejected_before_starting() {
    let update_loop = UpdateLoop::new("invalid");
    let mut config = UpdateLoopConfig::default();
    config.period_ms = 0;

    let err = update_loop
        .start(LiveSeriesStore::new("s"), config)
        .expect_err("zero period");
    assert!(matches!(err, LiveError::InvalidConfig(_)));
    assert_eq!(update_loop.state(), UpdateLoopState::Idle);
    assert_eq!(update_loop.run_id(), 0);
}

#[test]
fn initial_point_count_seeds_the_store() {
    let store = LiveSeriesStore::new("seeded");
    let update_loop = UpdateLoop::new("seeded");
    let config = UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::RandomWalkAppend)
        .with_initial_point_count(5)
        .with_value_range(-1.0, 1.0)
        .with_random_walk_step(0.1)
        .with_seed(3)
        .with_max_cycles(4);

    update_loop.start(store.clone(), config).expect("start");
    update_loop.wait().expect("completed");

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 9);
    let values: Vec<f64> = snapshot.values().collect();
    for pair in values.windows(2) {
        assert!((pair[1] - pair[0]).abs() <= 0.1 + 1e-12);
    }
    assert!(values.iter().all(|value| (-1.0..=1.0).contains(value)));
}

#[test]
fn redraw_is_dispatched_after_every_cycle() {
    let store = LiveSeriesStore::new("redraw");
    let dispatcher = QueuedDispatcher::new();
    let redraws = Arc::new(AtomicUsize::new(0));
    let update_loop = {
        let redraws = Arc::clone(&redraws);
        UpdateLoop::new("redraw").with_redraw(Arc::new(dispatcher.clone()), move || {
            redraws.fetch_add(1, Ordering::SeqCst);
        })
    };

    let config = UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::AppendOnly)
        .with_max_cycles(3);
    update_loop.start(store, config).expect("start");
    update_loop.wait().expect("completed");

    assert_eq!(redraws.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.run_pending(), 3);
    assert_eq!(redraws.load(Ordering::SeqCst), 3);
}

#[test]
fn dropping_the_loop_stops_its_worker() {
    let store = LiveSeriesStore::new("dropped");
    {
        let update_loop = UpdateLoop::new("dropped");
        let config = UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::AppendOnly);
        update_loop.start(store.clone(), config).expect("start");
        assert!(wait_until(Duration::from_secs(5), || store.len() >= 2));
    }
    let len = store.len();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(store.len(), len);
}

#[test]
fn restart_reports_an_unobserved_failure_before_running_again() {
    let store = LiveSeriesStore::new("restart");
    let update_loop = UpdateLoop::new("restart");
    let config = UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::AppendOnly);
    let failing = |_store: &LiveSeriesStore, _cycle: u64| -> live_series::LiveResult<()> {
        Err(LiveError::InvalidData("sensor offline".to_owned()))
    };

    update_loop
        .start_with_policy(store.clone(), config, failing)
        .expect("first start");
    assert!(wait_until(Duration::from_secs(5), || {
        update_loop.state() == UpdateLoopState::Idle
    }));

    let err = update_loop
        .start(store.clone(), config.with_max_cycles(2))
        .expect_err("pending failure is reported");
    assert!(matches!(err, LiveError::PolicyExecution { cycle: 0, .. }));
    assert_eq!(update_loop.state(), UpdateLoopState::Idle);
    assert_eq!(update_loop.run_id(), 1);
    assert!(update_loop.take_error().is_none());

    update_loop
        .start(store.clone(), config.with_max_cycles(2))
        .expect("second start");
    let summary = update_loop.wait().expect("completed");
    assert_eq!(summary.run_id, 2);
    assert_eq!(summary.exit, LoopExit::Completed);
    assert_eq!(store.len(), 2);
}

#[test]
fn restart_reports_a_panicked_worker() {
    let update_loop = UpdateLoop::new("restart-panic");
    let config = UpdateLoopConfig::new(Duration::from_millis(1), MutationPolicy::AppendOnly);
    let panicking = |_store: &LiveSeriesStore, _cycle: u64| -> live_series::LiveResult<()> {
        panic!("policy bug");
    };
    update_loop
        .start_with_policy(LiveSeriesStore::new("a"), config, panicking)
        .expect("start");
    assert!(wait_until(Duration::from_secs(5), || {
        update_loop.state() == UpdateLoopState::Idle
    }));

    assert!(matches!(
        update_loop.start(LiveSeriesStore::new("b"), config),
        Err(LiveError::InvalidState(_))
    ));
    update_loop
        .start(LiveSeriesStore::new("c"), config.with_max_cycles(1))
        .expect("restart after report");
    assert_eq!(update_loop.wait().expect("completed").exit, LoopExit::Completed);
}
