//! Empirical distribution and total variation tracking.

use crate::random_walk::WalkState;
use std::sync::Arc;
use tracing::trace;

/// Default number of steps between error samples.
pub const DEFAULT_SAMPLING_CADENCE: u64 = 100;

const HISTORY_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorSample {
    pub step: u64,
    /// Total variation distance, in `[0, 1]`.
    pub error: f64,
}

/// Visit frequencies of the walk so far.
///
/// All zeros before the first step. Otherwise counts are divided by the recorded visits, which
/// equals `total_steps` unless the start node was seeded with a visit.
///
/// Under [`StartVisitPolicy::Counted`](crate::StartVisitPolicy::Counted) that is
/// `total_steps + 1`, not `total_steps`, so the result still sums to 1.
pub fn empirical_distribution(state: &WalkState) -> Vec<f64> {
    if state.total_steps == 0 {
        return vec![0.0; state.visit_counts.len()];
    }
    let visits = state.total_visits().max(state.total_steps) as f64;
    state.visit_counts.iter().map(|&c| c as f64 / visits).collect()
}

/// \( \tfrac12 \sum_i |p_i - q_i| \) over the indices of `p`; missing entries of `q` count as 0.
///
/// Clamped to `[0, 1]`.
pub fn total_variation(p: &[f64], q: &[f64]) -> f64 {
    let l1: f64 = p
        .iter()
        .enumerate()
        .map(|(i, &a)| (a - q.get(i).copied().unwrap_or(0.0)).abs())
        .sum();
    (0.5 * l1).clamp(0.0, 1.0)
}

pub type ChunkItems<'a> = fn(&'a Arc<[ErrorSample]>) -> &'a [ErrorSample];

pub type HistoryIter<'a> = std::iter::Chain<
    std::iter::FlatMap<std::slice::Iter<'a, Arc<[ErrorSample]>>, &'a [ErrorSample], ChunkItems<'a>>,
    std::slice::Iter<'a, ErrorSample>,
>;

fn chunk_items(chunk: &Arc<[ErrorSample]>) -> &[ErrorSample] {
    chunk
}

/// Append-only log of error samples.
///
/// Full chunks are frozen and shared between clones, so cloning costs one `Arc` bump plus a
/// copy of the open tail (fewer than `HISTORY_CHUNK` samples), however long the run.
#[derive(Debug, Clone, Default)]
pub struct ErrorHistory {
    sealed: Arc<Vec<Arc<[ErrorSample]>>>,
    tail: Vec<ErrorSample>,
}

impl ErrorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: ErrorSample) {
        self.tail.push(sample);
        if self.tail.len() == HISTORY_CHUNK {
            let chunk: Arc<[ErrorSample]> = std::mem::take(&mut self.tail).into();
            Arc::make_mut(&mut self.sealed).push(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * HISTORY_CHUNK + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&ErrorSample> {
        let (chunk, offset) = (index / HISTORY_CHUNK, index % HISTORY_CHUNK);
        match self.sealed.get(chunk) {
            Some(sealed) => sealed.get(offset),
            None if chunk == self.sealed.len() => self.tail.get(offset),
            None => None,
        }
    }

    pub fn last(&self) -> Option<&ErrorSample> {
        self.tail.last().or_else(|| self.sealed.last().and_then(|chunk| chunk.last()))
    }

    /// Samples in step order.
    pub fn iter(&self) -> HistoryIter<'_> {
        self.sealed.iter().flat_map(chunk_items as ChunkItems<'_>).chain(self.tail.iter())
    }

    pub fn to_vec(&self) -> Vec<ErrorSample> {
        self.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl PartialEq for ErrorHistory {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<'a> IntoIterator for &'a ErrorHistory {
    type Item = &'a ErrorSample;
    type IntoIter = HistoryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Appends a TV sample every `cadence` steps.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    cadence: u64,
    history: ErrorHistory,
}

impl ConvergenceTracker {
    /// A cadence of zero is treated as one.
    pub fn new(cadence: u64) -> Self {
        Self { cadence: cadence.max(1), history: ErrorHistory::new() }
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    pub fn history(&self) -> &ErrorHistory {
        &self.history
    }

    pub fn latest(&self) -> Option<ErrorSample> {
        self.history.last().copied()
    }

    /// Evaluate after a step; records and returns a sample when the step count hits the cadence.
    pub fn observe(&mut self, state: &WalkState, analytical: &[f64]) -> Option<ErrorSample> {
        let step = state.total_steps;
        if step == 0 || step % self.cadence != 0 {
            return None;
        }
        let sample = ErrorSample { step, error: total_variation(analytical, &empirical_distribution(state)) };
        trace!(step, error = sample.error, "error sample");
        self.history.push(sample);
        Some(sample)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for ConvergenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLING_CADENCE)
    }
}
