//! The tick unit: one walk step plus one convergence evaluation, against one graph version.

use crate::convergence::{
    empirical_distribution, ConvergenceTracker, ErrorHistory, ErrorSample, DEFAULT_SAMPLING_CADENCE,
};
use crate::graph::{GraphRef, UndirectedGraph, UnknownNodePolicy};
use crate::random_walk::{RandomWalkSimulator, StartVisitPolicy, WalkState};
use crate::stationary::{stationary_distribution, StationaryConfig, StationaryRun};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub const MIN_TICK_INTERVAL_MS: u64 = 10;
pub const MAX_TICK_INTERVAL_MS: u64 = 1_000;

static NEXT_TOPOLOGY_VERSION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Delay between ticks, in `[MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS]`.
    pub tick_interval_ms: u64,
    /// Steps between error samples.
    pub sampling_cadence_steps: u64,
    pub convergence_tolerance: f64,
    pub max_iterations: usize,
    /// Holding probability of the lazy chain used by the solver.
    pub laziness: f64,
    pub seed: u64,
    pub start_visit: StartVisitPolicy,
    pub unknown_nodes: UnknownNodePolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let solver = StationaryConfig::default();
        Self {
            tick_interval_ms: 100,
            sampling_cadence_steps: DEFAULT_SAMPLING_CADENCE,
            convergence_tolerance: solver.tolerance,
            max_iterations: solver.max_iterations,
            laziness: solver.laziness,
            seed: 42,
            start_visit: StartVisitPolicy::default(),
            unknown_nodes: UnknownNodePolicy::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        check_tick_interval(self.tick_interval_ms)?;
        if self.sampling_cadence_steps == 0 {
            return Err(Error::InvalidParameter("sampling_cadence_steps must be positive".into()));
        }
        if !(self.convergence_tolerance.is_finite() && self.convergence_tolerance > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "convergence_tolerance must be positive and finite, got {}",
                self.convergence_tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidParameter("max_iterations must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.laziness) {
            return Err(Error::InvalidParameter(format!("laziness must be in [0, 1), got {}", self.laziness)));
        }
        Ok(())
    }

    pub fn stationary(&self) -> StationaryConfig {
        StationaryConfig {
            max_iterations: self.max_iterations,
            tolerance: self.convergence_tolerance,
            laziness: self.laziness,
        }
    }
}

pub(crate) fn check_tick_interval(ms: u64) -> Result<()> {
    if (MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&ms) {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "tick interval {ms}ms outside [{MIN_TICK_INTERVAL_MS}, {MAX_TICK_INTERVAL_MS}]"
        )))
    }
}

/// A graph together with its stationary distribution.
///
/// Built once per graph version and shared behind an `Arc`, so a step can never see the
/// graph of one version and \(\pi\) of another.
#[derive(Debug)]
pub struct Topology {
    graph: UndirectedGraph,
    stationary: StationaryRun,
    version: u64,
}

impl Topology {
    pub fn new(graph: UndirectedGraph, config: StationaryConfig) -> Self {
        let stationary = stationary_distribution(&graph, config);
        let version = NEXT_TOPOLOGY_VERSION.fetch_add(1, Ordering::Relaxed);
        debug!(version, nodes = graph.node_count(), method = ?stationary.method, "topology built");
        Self { graph, stationary, version }
    }

    /// Symmetrize raw adjacency under `config.unknown_nodes` and solve for \(\pi\).
    pub fn from_raw<K, N, S>(
        raw: impl IntoIterator<Item = (K, N)>,
        node_ids: &[S],
        config: &SimulationConfig,
    ) -> Result<Self>
    where
        K: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
        S: AsRef<str>,
    {
        let (graph, _report) = UndirectedGraph::symmetrize_with(raw, node_ids, config.unknown_nodes)?;
        Ok(Self::new(graph, config.stationary()))
    }

    pub fn graph(&self) -> &UndirectedGraph {
        &self.graph
    }

    pub fn stationary(&self) -> &StationaryRun {
        &self.stationary
    }

    pub fn analytical(&self) -> &[f64] {
        &self.stationary.distribution
    }

    pub fn analytical_by_id(&self) -> BTreeMap<&str, f64> {
        by_id(&self.graph, self.analytical())
    }

    /// Process-unique identifier of this graph version.
    pub fn version(&self) -> u64 {
        self.version
    }
}

fn by_id<'a, T: Copy>(graph: &'a UndirectedGraph, values: &[T]) -> BTreeMap<&'a str, T> {
    graph.node_ids().iter().map(String::as_str).zip(values.iter().copied()).collect()
}

/// Walk state, tracker and graph version, advanced only through [`Simulation::tick`].
///
/// This is the single-threaded core; [`crate::SimulationScheduler`] drives one from a timer.
#[derive(Debug, Clone)]
pub struct Simulation {
    topology: Arc<Topology>,
    walker: RandomWalkSimulator,
    tracker: ConvergenceTracker,
    start: usize,
}

impl Simulation {
    pub fn new(topology: Arc<Topology>, start: &str, config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let start = topology.graph().index_of(start).ok_or_else(|| Error::UnknownNode(start.to_string()))?;
        let walker =
            RandomWalkSimulator::new(topology.graph().node_count(), start, config.seed, config.start_visit);
        Ok(Self { topology, walker, tracker: ConvergenceTracker::new(config.sampling_cadence_steps), start })
    }

    /// One step followed by one tracker evaluation.
    pub fn tick(&mut self) -> Option<ErrorSample> {
        self.walker.step(self.topology.graph());
        self.tracker.observe(self.walker.state(), self.topology.analytical())
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Back to the start node with cleared counts, history and RNG.
    pub fn reset(&mut self) {
        self.walker.reset(self.topology.graph().node_count(), self.start);
        self.tracker.clear();
    }

    /// Reset with a new start node.
    pub fn retarget(&mut self, start: &str) -> Result<()> {
        self.start =
            self.topology.graph().index_of(start).ok_or_else(|| Error::UnknownNode(start.to_string()))?;
        self.reset();
        Ok(())
    }

    /// Swap in a new graph version and reset the walk.
    ///
    /// The start node is kept when the new graph has it; otherwise the first node is used.
    pub fn replace_topology(&mut self, topology: Arc<Topology>) {
        let start_id = self.start_id().to_string();
        self.start = topology.graph().index_of(&start_id).unwrap_or(0);
        self.topology = topology;
        self.reset();
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn state(&self) -> &WalkState {
        self.walker.state()
    }

    pub fn history(&self) -> &ErrorHistory {
        self.tracker.history()
    }

    pub fn start_id(&self) -> &str {
        self.topology.graph().node_id(self.start).unwrap_or_default()
    }

    pub fn current_id(&self) -> &str {
        self.topology.graph().node_id(self.walker.current()).unwrap_or_default()
    }

    pub fn empirical(&self) -> Vec<f64> {
        empirical_distribution(self.walker.state())
    }

    pub fn snapshot(&self, running: bool, tick_interval_ms: u64) -> Snapshot {
        Snapshot {
            topology: Arc::clone(&self.topology),
            walk: self.walker.state().clone(),
            history: self.tracker.history().clone(),
            start: self.start,
            running,
            tick_interval_ms,
        }
    }
}

/// Immutable, self-consistent view of the read surface.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub topology: Arc<Topology>,
    pub walk: WalkState,
    pub history: ErrorHistory,
    pub start: usize,
    pub running: bool,
    pub tick_interval_ms: u64,
}

impl Snapshot {
    pub fn current_node(&self) -> &str {
        self.topology.graph().node_id(self.walk.current).unwrap_or_default()
    }

    pub fn start_node(&self) -> &str {
        self.topology.graph().node_id(self.start).unwrap_or_default()
    }

    pub fn total_steps(&self) -> u64 {
        self.walk.total_steps
    }

    pub fn visit_counts(&self) -> &[u64] {
        &self.walk.visit_counts
    }

    pub fn visit_counts_by_id(&self) -> BTreeMap<&str, u64> {
        by_id(self.topology.graph(), &self.walk.visit_counts)
    }

    pub fn analytical_distribution(&self) -> &[f64] {
        self.topology.analytical()
    }

    pub fn analytical_by_id(&self) -> BTreeMap<&str, f64> {
        self.topology.analytical_by_id()
    }

    pub fn empirical_distribution(&self) -> Vec<f64> {
        empirical_distribution(&self.walk)
    }

    pub fn empirical_by_id(&self) -> BTreeMap<&str, f64> {
        by_id(self.topology.graph(), &self.empirical_distribution())
    }

    pub fn error_history(&self) -> &ErrorHistory {
        &self.history
    }

    pub fn latest_error(&self) -> Option<ErrorSample> {
        self.history.last().copied()
    }
}
