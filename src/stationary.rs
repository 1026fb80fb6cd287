//! Stationary distribution of the simple random walk, by power iteration.
//!
//! The transition matrix is implicit in the graph:
//! \[
//!   P(u \to v) = \frac{1}{\deg(u)} \quad (v \in N(u)), \qquad P(u \to u) = 1 \quad (\deg(u) = 0)
//! \]
//!
//! Iteration runs on the lazy chain \(P_a = (1 - a) P + a I\), which has the same stationary
//! distributions as \(P\) but no periodicity, so bipartite graphs converge too.

use crate::graph::GraphRef;
use crate::{InvalidGraphError, Result};
use tracing::{debug, warn};

/// Accepted deviation of \(\sum_i \pi_i\) from 1 before falling back.
pub const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationaryConfig {
    pub max_iterations: usize,
    /// Stop when the L1 change between successive estimates drops below this.
    pub tolerance: f64,
    /// Holding probability \(a \in [0, 1)\) of the lazy chain. `0.0` iterates \(P\) itself.
    pub laziness: f64,
}

impl Default for StationaryConfig {
    fn default() -> Self {
        Self { max_iterations: 5_000, tolerance: 1e-12, laziness: 0.5 }
    }
}

/// Which branch produced the distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveMethod {
    PowerIteration,
    /// \(\pi_i = \deg(i) / \sum_j \deg(j)\).
    DegreeFallback,
    /// \(\pi_i = 1/n\); used when every node is isolated.
    UniformFallback,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationaryRun {
    /// Indexed by node.
    pub distribution: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub method: SolveMethod,
}

/// Like [`stationary_distribution`], but rejects graphs without nodes.
pub fn stationary_distribution_checked<G: GraphRef>(
    graph: &G,
    config: StationaryConfig,
) -> Result<StationaryRun> {
    if graph.node_count() == 0 {
        return Err(InvalidGraphError::EmptyNodeSet.into());
    }
    Ok(stationary_distribution(graph, config))
}

/// Compute \(\pi\) with \(\pi = \pi P\), starting from the uniform vector.
///
/// Outcomes:
/// - converged within `max_iterations`: the power-iteration estimate
/// - the next estimate has zero or non-finite mass: iteration stops and the last valid
///   estimate is kept
/// - iteration cap reached: the last estimate, reported with `converged: false`
///
/// Whatever the outcome, a result whose sum is off by more than [`SUM_TOLERANCE`] is replaced
/// by the degree-proportional fallback (uniform when the total degree is zero).
///
/// Never fails; an empty graph yields an empty distribution.
pub fn stationary_distribution<G: GraphRef>(graph: &G, config: StationaryConfig) -> StationaryRun {
    let n = graph.node_count();
    if n == 0 {
        return StationaryRun {
            distribution: Vec::new(),
            iterations: 0,
            converged: true,
            method: SolveMethod::PowerIteration,
        };
    }

    let laziness = if (0.0..1.0).contains(&config.laziness) {
        config.laziness
    } else {
        warn!(laziness = config.laziness, "laziness outside [0, 1); iterating P directly");
        0.0
    };

    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;
    let mut aborted = false;

    for _ in 0..config.max_iterations {
        iterations += 1;
        next.fill(0.0);
        for u in 0..n {
            let mass = scores[u];
            if mass == 0.0 {
                continue;
            }
            let nbrs = graph.neighbors_ref(u);
            if nbrs.is_empty() {
                // absorbing
                next[u] += mass;
                continue;
            }
            let stay = laziness * mass;
            next[u] += stay;
            let share = (mass - stay) / nbrs.len() as f64;
            for &v in nbrs {
                next[v] += share;
            }
        }

        let sum: f64 = next.iter().sum();
        if sum == 0.0 || !sum.is_finite() {
            warn!(iterations, sum, "power iteration lost normalization; keeping last estimate");
            aborted = true;
            break;
        }
        for x in &mut next {
            *x /= sum;
        }

        let diff: f64 = scores.iter().zip(next.iter()).map(|(old, new)| (old - new).abs()).sum();
        std::mem::swap(&mut scores, &mut next);
        if diff < config.tolerance {
            converged = true;
            break;
        }
    }

    let sum: f64 = scores.iter().sum();
    let normalized = sum.is_finite() && (sum - 1.0).abs() <= SUM_TOLERANCE;

    if normalized {
        if converged {
            debug!(iterations, "stationary distribution by power iteration");
        } else if !aborted {
            warn!(iterations, tolerance = config.tolerance, "power iteration hit the cap; keeping last estimate");
        }
        return StationaryRun { distribution: scores, iterations, converged, method: SolveMethod::PowerIteration };
    }

    warn!(iterations, sum, "power iteration normalization issue; using fallback");
    let (distribution, method) = fallback_distribution(graph);
    StationaryRun { distribution, iterations, converged, method }
}

/// Degree-proportional distribution, or uniform when no node has an edge.
///
/// For a connected graph the degree-proportional vector is the exact stationary distribution.
pub fn fallback_distribution<G: GraphRef>(graph: &G) -> (Vec<f64>, SolveMethod) {
    let n = graph.node_count();
    let degrees: Vec<usize> = (0..n).map(|i| graph.out_degree(i)).collect();
    let total: usize = degrees.iter().sum();
    if total > 0 {
        let total = total as f64;
        (degrees.iter().map(|&d| d as f64 / total).collect(), SolveMethod::DegreeFallback)
    } else {
        (vec![1.0 / n as f64; n], SolveMethod::UniformFallback)
    }
}

/// L1 norm of \(\pi P - \pi\) for the (non-lazy) walk.
pub fn stationarity_residual<G: GraphRef>(graph: &G, pi: &[f64]) -> f64 {
    let n = graph.node_count();
    let mut next = vec![0.0; n];
    for u in 0..n.min(pi.len()) {
        let nbrs = graph.neighbors_ref(u);
        if nbrs.is_empty() {
            next[u] += pi[u];
            continue;
        }
        let share = pi[u] / nbrs.len() as f64;
        for &v in nbrs {
            next[v] += share;
        }
    }
    next.iter()
        .enumerate()
        .map(|(i, x)| (x - pi.get(i).copied().unwrap_or(0.0)).abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Adj(Vec<Vec<usize>>);

    impl GraphRef for Adj {
        fn node_count(&self) -> usize {
            self.0.len()
        }
        fn neighbors_ref(&self, node: usize) -> &[usize] {
            self.0.get(node).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    fn star(k: usize) -> Adj {
        let mut adj = vec![(1..=k).collect::<Vec<_>>()];
        adj.extend((0..k).map(|_| vec![0]));
        Adj(adj)
    }

    #[test]
    fn star_without_laziness_keeps_capped_estimate() {
        // The plain chain on a star has period 2: the estimate oscillates forever.
        let cfg = StationaryConfig { max_iterations: 200, tolerance: 1e-12, laziness: 0.0 };
        let run = stationary_distribution(&star(4), cfg);
        assert!(!run.converged);
        assert_eq!(run.iterations, 200);
        assert_eq!(run.method, SolveMethod::PowerIteration);
        // Even iteration count: back at the uniform start.
        assert!(run.distribution.iter().all(|&x| (x - 0.2).abs() < 1e-12), "{:?}", run.distribution);
    }

    #[test]
    fn capped_estimate_is_kept_on_disconnected_graph() {
        // Path 0..20 plus isolated node 20. The isolated node is absorbing, so it holds its
        // initial 1/21 at every iteration; the degree fallback would give it 0.
        let n = 20;
        let mut adj: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                let mut nbrs = Vec::new();
                if i > 0 {
                    nbrs.push(i - 1);
                }
                if i + 1 < n {
                    nbrs.push(i + 1);
                }
                nbrs
            })
            .collect();
        adj.push(Vec::new());
        let g = Adj(adj);

        let capped = StationaryConfig { max_iterations: 10, ..StationaryConfig::default() };
        let run = stationary_distribution(&g, capped);
        assert!(!run.converged);
        assert_eq!(run.iterations, 10);
        assert_eq!(run.method, SolveMethod::PowerIteration);
        assert!((run.distribution[n] - 1.0 / 21.0).abs() < 1e-12);

        let full = stationary_distribution(&g, StationaryConfig { max_iterations: 1_000_000, ..capped });
        assert!(full.converged);
        assert!((full.distribution[n] - run.distribution[n]).abs() < 1e-12);
    }

    #[test]
    fn star_with_laziness_converges() {
        let run = stationary_distribution(&star(4), StationaryConfig::default());
        assert!(run.converged);
        assert_eq!(run.method, SolveMethod::PowerIteration);
        assert!((run.distribution[0] - 0.5).abs() < 1e-9);
        for leaf in 1..=4 {
            assert!((run.distribution[leaf] - 0.125).abs() < 1e-9);
        }
        assert!(stationarity_residual(&star(4), &run.distribution) < 1e-9);
    }

    #[test]
    fn isolated_nodes_are_absorbing() {
        // 0 - 1, and 2 isolated: the isolated node keeps its initial mass.
        let g = Adj(vec![vec![1], vec![0], vec![]]);
        let run = stationary_distribution(&g, StationaryConfig::default());
        assert!(run.converged);
        assert!((run.distribution[2] - 1.0 / 3.0).abs() < 1e-9);
        assert!((run.distribution[0] - run.distribution[1]).abs() < 1e-9);
        let s: f64 = run.distribution.iter().sum();
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_isolated_is_uniform() {
        let g = Adj(vec![vec![], vec![], vec![], vec![]]);
        let run = stationary_distribution(&g, StationaryConfig::default());
        assert!(run.distribution.iter().all(|&x| (x - 0.25).abs() < 1e-12));

        let (fallback, method) = fallback_distribution(&g);
        assert_eq!(method, SolveMethod::UniformFallback);
        assert_eq!(fallback, vec![0.25; 4]);
    }

    #[test]
    fn zero_iterations_keep_uniform_start() {
        let cfg = StationaryConfig { max_iterations: 0, ..StationaryConfig::default() };
        let run = stationary_distribution(&star(2), cfg);
        assert_eq!(run.iterations, 0);
        assert!(!run.converged);
        assert_eq!(run.method, SolveMethod::PowerIteration);
        assert!(run.distribution.iter().all(|&x| (x - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn empty_graph() {
        let g = Adj(Vec::new());
        assert!(stationary_distribution(&g, StationaryConfig::default()).distribution.is_empty());
        assert!(stationary_distribution_checked(&g, StationaryConfig::default()).is_err());
    }

    #[test]
    fn deterministic() {
        let g = Adj(vec![vec![1, 2], vec![0, 2, 3], vec![0, 1], vec![1]]);
        let a = stationary_distribution(&g, StationaryConfig::default());
        let b = stationary_distribution(&g, StationaryConfig::default());
        assert_eq!(a.distribution, b.distribution);
        assert_eq!(a.iterations, b.iterations);
    }
}
