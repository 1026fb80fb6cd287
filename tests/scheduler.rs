use std::thread;
use std::time::{Duration, Instant};
use walkconv::{Error, SimulationConfig, SimulationScheduler, UndirectedGraph};

fn square() -> UndirectedGraph {
    let raw = [("A", ["B", "D"]), ("C", ["B", "D"])];
    UndirectedGraph::symmetrize(raw, &["A", "B", "C", "D"]).unwrap()
}

fn config(tick_interval_ms: u64) -> SimulationConfig {
    SimulationConfig { tick_interval_ms, sampling_cadence_steps: 3, ..Default::default() }
}

#[test]
fn repeated_start_arms_a_single_timer() {
    let sched = SimulationScheduler::new(square(), "A", config(20)).unwrap();

    let began = Instant::now();
    for _ in 0..5 {
        sched.start().unwrap();
    }
    assert!(sched.is_running());
    thread::sleep(Duration::from_millis(200));
    sched.pause().unwrap();
    let elapsed = began.elapsed().as_millis() as u64;

    // Ticks are at least one interval apart: a second timer would double this.
    let steps = sched.snapshot().total_steps();
    assert!(steps > 0);
    assert!(steps <= elapsed / 20 + 1, "steps={steps} elapsed={elapsed}ms");
}

#[test]
fn snapshots_are_consistent_while_running() {
    let sched = SimulationScheduler::new(square(), "A", config(10)).unwrap();
    sched.start().unwrap();

    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        let snap = sched.snapshot();
        assert_eq!(snap.walk.total_visits(), snap.total_steps());
        // Each sample is taken exactly at a cadence boundary, and none is missing.
        assert_eq!(snap.error_history().len() as u64, snap.total_steps() / 3);
        if let Some(last) = snap.latest_error() {
            assert_eq!(last.step % 3, 0);
            assert!(last.step <= snap.total_steps());
        }
        thread::sleep(Duration::from_millis(3));
    }
    sched.pause().unwrap();
}

#[test]
fn retarget_stops_and_moves_start() {
    let sched = SimulationScheduler::new(square(), "A", config(10)).unwrap();
    sched.start().unwrap();
    thread::sleep(Duration::from_millis(60));

    sched.retarget("C").unwrap();
    let snap = sched.snapshot();
    assert!(!snap.running);
    assert_eq!(snap.current_node(), "C");
    assert_eq!(snap.start_node(), "C");
    assert_eq!(snap.total_steps(), 0);
    assert!(snap.error_history().is_empty());

    // reset() now returns to the new start.
    sched.start().unwrap();
    thread::sleep(Duration::from_millis(40));
    sched.reset().unwrap();
    assert_eq!(sched.snapshot().current_node(), "C");
}

#[test]
fn tick_interval_change_applies_after_armed_tick() {
    let sched = SimulationScheduler::new(square(), "A", config(300)).unwrap();
    sched.start().unwrap();
    sched.set_tick_interval_ms(10).unwrap();

    // The tick armed for 300ms keeps its deadline.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(sched.snapshot().total_steps(), 0);
    assert_eq!(sched.snapshot().tick_interval_ms, 10);

    // After it fires, ticks follow the new interval.
    thread::sleep(Duration::from_millis(400));
    sched.pause().unwrap();
    assert!(sched.snapshot().total_steps() >= 2);
}

#[test]
fn replace_graph_swaps_graph_and_distribution_together() {
    let sched = SimulationScheduler::new(square(), "A", config(10)).unwrap();
    let before = sched.snapshot().topology.version();
    sched.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    // Star around A with three leaves.
    let star = UndirectedGraph::symmetrize([("A", ["X", "Y", "Z"])], &["A", "X", "Y", "Z"]).unwrap();
    sched.replace_graph(star).unwrap();

    let snap = sched.snapshot();
    assert!(!snap.running);
    assert_ne!(snap.topology.version(), before);
    assert_eq!(snap.total_steps(), 0);
    assert_eq!(snap.visit_counts().len(), 4);
    assert_eq!(snap.start_node(), "A");
    let pi = snap.analytical_distribution();
    assert!((pi[0] - 0.5).abs() < 1e-9);
    assert!((pi[1] - 1.0 / 6.0).abs() < 1e-9);
}

#[test]
fn invalid_config_is_rejected() {
    let err = SimulationScheduler::new(square(), "A", config(2)).err().unwrap();
    assert!(matches!(err, Error::InvalidParameter(_)));

    let err = SimulationScheduler::new(square(), "Q", config(50)).err().unwrap();
    assert!(matches!(err, Error::UnknownNode(_)));
}
