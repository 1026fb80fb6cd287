//! `walkconv`: a random walk on an undirected graph, tracked against its stationary distribution.
//!
//! Pipeline:
//! - [`graph::UndirectedGraph::symmetrize`] validates raw (possibly asymmetric) adjacency.
//! - [`stationary::stationary_distribution`] computes \(\pi\) by power iteration.
//! - [`random_walk::RandomWalkSimulator`] advances the walk one step at a time.
//! - [`convergence::ConvergenceTracker`] samples the total variation distance between the
//!   empirical visit frequencies and \(\pi\).
//! - [`simulation::Simulation`] binds one step and one tracker evaluation into a tick.
//! - [`scheduler::SimulationScheduler`] drives ticks from a dedicated thread.
//!
//! Public invariants (must not drift):
//! - **Node order**: every vector is indexed by the node order given to `symmetrize`.
//! - **Determinism**: the solver is deterministic given identical graphs and configs; walks are
//!   deterministic given identical seeds and start nodes.
//! - **Single writer**: walk state and error history are only mutated by the tick handler.

pub mod convergence;
pub mod graph;
pub mod random_walk;
pub mod scheduler;
pub mod simulation;
pub mod stationary;

pub use convergence::{
    empirical_distribution, total_variation, ConvergenceTracker, ErrorHistory, ErrorSample,
};
pub use graph::{GraphRef, SymmetrizeReport, UndirectedGraph, UnknownNodePolicy};
pub use random_walk::{RandomWalkSimulator, StartVisitPolicy, WalkState};
pub use scheduler::SimulationScheduler;
pub use simulation::{
    Simulation, SimulationConfig, Snapshot, Topology, MAX_TICK_INTERVAL_MS, MIN_TICK_INTERVAL_MS,
};
pub use stationary::{
    stationary_distribution, stationary_distribution_checked, SolveMethod, StationaryConfig,
    StationaryRun,
};

/// Structural problems that make a graph unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidGraphError {
    #[error("node id set is empty")]
    EmptyNodeSet,
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("adjacency of {node} references unknown node {neighbor}")]
    UnknownNeighbor { node: String, neighbor: String },
    #[error("adjacency entry for unknown node {0}")]
    UnknownAdjacencyKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] InvalidGraphError),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("simulation driver is not running")]
    Disconnected,
    #[error("failed to spawn simulation driver: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
