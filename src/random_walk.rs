//! Incremental simple random walk.

use crate::graph::GraphRef;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Whether the start node counts as visited at step 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StartVisitPolicy {
    /// All counts start at zero: `Σ visit_counts == total_steps`.
    #[default]
    Uncounted,
    /// The start node starts at one: `Σ visit_counts == total_steps + 1`.
    Counted,
}

impl StartVisitPolicy {
    /// Visits recorded before the first step.
    pub fn seed_visits(self) -> u64 {
        match self {
            Self::Uncounted => 0,
            Self::Counted => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WalkState {
    pub current: usize,
    pub total_steps: u64,
    /// Indexed by node.
    pub visit_counts: Vec<u64>,
}

impl WalkState {
    pub fn new(node_count: usize, start: usize, policy: StartVisitPolicy) -> Self {
        let mut visit_counts = vec![0; node_count];
        if let Some(c) = visit_counts.get_mut(start) {
            *c = policy.seed_visits();
        }
        Self { current: start, total_steps: 0, visit_counts }
    }

    pub fn total_visits(&self) -> u64 {
        self.visit_counts.iter().sum()
    }
}

/// One walker, one seeded RNG.
///
/// The graph is passed to [`RandomWalkSimulator::step`] rather than owned, so the caller
/// decides which graph version a step is evaluated against.
#[derive(Debug, Clone)]
pub struct RandomWalkSimulator {
    state: WalkState,
    policy: StartVisitPolicy,
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomWalkSimulator {
    pub fn new(node_count: usize, start: usize, seed: u64, policy: StartVisitPolicy) -> Self {
        Self {
            state: WalkState::new(node_count, start, policy),
            policy,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn state(&self) -> &WalkState {
        &self.state
    }

    pub fn current(&self) -> usize {
        self.state.current
    }

    pub fn total_steps(&self) -> u64 {
        self.state.total_steps
    }

    pub fn policy(&self) -> StartVisitPolicy {
        self.policy
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Advance one step using the simulator's own RNG. Returns the new position.
    pub fn step<G: GraphRef>(&mut self, graph: &G) -> usize {
        let next = next_node(graph, self.state.current, &mut self.rng);
        self.apply(next);
        next
    }

    /// Advance one step drawing from an external random source.
    pub fn step_with<G: GraphRef, R: Rng>(&mut self, graph: &G, rng: &mut R) -> usize {
        let next = next_node(graph, self.state.current, rng);
        self.apply(next);
        next
    }

    /// Clear counts, move to `start` and reseed, so the walk replays from scratch.
    pub fn reset(&mut self, node_count: usize, start: usize) {
        self.state = WalkState::new(node_count, start, self.policy);
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    fn apply(&mut self, next: usize) {
        self.state.current = next;
        self.state.total_steps += 1;
        if let Some(c) = self.state.visit_counts.get_mut(next) {
            *c += 1;
        }
    }
}

/// Uniform choice among the neighbors of `curr`; a node without neighbors stays put.
pub fn next_node<G: GraphRef, R: Rng>(graph: &G, curr: usize, rng: &mut R) -> usize {
    graph.neighbors_ref(curr).choose(rng).copied().unwrap_or(curr)
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

    #[test]
    fn isolated_node_self_loops() {
        let g = Adj(vec![vec![], vec![]]);
        let mut sim = RandomWalkSimulator::new(2, 1, 7, StartVisitPolicy::Uncounted);
        for _ in 0..5 {
            assert_eq!(sim.step(&g), 1);
        }
        assert_eq!(sim.state().visit_counts, vec![0, 5]);
        assert_eq!(sim.total_steps(), 5);
    }

    #[test]
    fn node_without_adjacency_entry_self_loops() {
        // Node 2 is out of the adjacency's range.
        let g = Adj(vec![vec![1], vec![0]]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(next_node(&g, 2, &mut rng), 2);
    }

    #[test]
    fn counted_policy_seeds_start() {
        let g = Adj(vec![vec![1], vec![0]]);
        let mut sim = RandomWalkSimulator::new(2, 0, 3, StartVisitPolicy::Counted);
        assert_eq!(sim.state().visit_counts, vec![1, 0]);
        sim.step(&g);
        sim.step(&g);
        // Path graph: 0 -> 1 -> 0.
        assert_eq!(sim.state().visit_counts, vec![2, 1]);
        assert_eq!(sim.state().total_visits(), sim.total_steps() + 1);
    }

    #[test]
    fn steps_follow_edges() {
        let g = Adj(vec![vec![1, 3], vec![0, 2], vec![1, 3], vec![2, 0]]);
        let mut sim = RandomWalkSimulator::new(4, 0, 42, StartVisitPolicy::Uncounted);
        let mut prev = sim.current();
        for _ in 0..200 {
            let next = sim.step(&g);
            assert!(g.neighbors_ref(prev).contains(&next), "{prev} -> {next} is not an edge");
            prev = next;
        }
    }

    #[test]
    fn external_rng_matches_own_rng_under_same_seed() {
        let g = Adj(vec![vec![1, 2, 3], vec![0, 2], vec![0, 1, 3], vec![0, 2]]);
        let mut own = RandomWalkSimulator::new(4, 0, 17, StartVisitPolicy::Uncounted);
        let mut driven = RandomWalkSimulator::new(4, 0, 0, StartVisitPolicy::Uncounted);
        let mut rng = ChaCha8Rng::seed_from_u64(17);

        for _ in 0..300 {
            assert_eq!(own.step(&g), driven.step_with(&g, &mut rng));
        }
        assert_eq!(own.state(), driven.state());
        assert_eq!(driven.total_steps(), 300);
        assert_eq!(driven.state().total_visits(), 300);
    }

    #[test]
    fn reset_replays_trajectory() {
        let g = Adj(vec![vec![1, 2], vec![0, 2], vec![0, 1, 3], vec![2]]);
        let mut sim = RandomWalkSimulator::new(4, 0, 99, StartVisitPolicy::Uncounted);
        let first: Vec<usize> = (0..50).map(|_| sim.step(&g)).collect();
        sim.reset(4, 0);
        assert_eq!(sim.total_steps(), 0);
        let second: Vec<usize> = (0..50).map(|_| sim.step(&g)).collect();
        assert_eq!(first, second);
    }
}
