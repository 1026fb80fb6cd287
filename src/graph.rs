//! Graph adapter trait and the validated undirected graph model.

use crate::{InvalidGraphError, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// A graph view that can return **borrowed** neighbor slices.
///
/// This is the “cache-friendly” adapter: it avoids allocating a new `Vec`
/// on every step of a random walk.
pub trait GraphRef {
    fn node_count(&self) -> usize;
    fn neighbors_ref(&self, node: usize) -> &[usize];
    fn out_degree(&self, node: usize) -> usize {
        self.neighbors_ref(node).len()
    }
}

/// What to do with adjacency that mentions ids outside the node set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnknownNodePolicy {
    /// Fail with [`InvalidGraphError`].
    #[default]
    Reject,
    /// Discard the reference and count it in [`SymmetrizeReport::dropped_refs`].
    Drop,
}

/// Repairs applied while symmetrizing raw adjacency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymmetrizeReport {
    /// Edges present in only one direction that were mirrored.
    pub mirrored_edges: usize,
    /// Repeated neighbor references collapsed into one edge.
    pub duplicate_refs: usize,
    /// References to unknown ids discarded under [`UnknownNodePolicy::Drop`].
    pub dropped_refs: usize,
}

impl SymmetrizeReport {
    pub fn is_clean(&self) -> bool {
        self.mirrored_edges == 0 && self.duplicate_refs == 0 && self.dropped_refs == 0
    }
}

/// Symmetric adjacency over a fixed, ordered node-id set.
///
/// Invariants:
/// - `v ∈ neighbors(u)` iff `u ∈ neighbors(v)`
/// - neighbor lists are sorted by node index and contain no duplicates
/// - the node set is non-empty
///
/// The node order is the order passed to [`UndirectedGraph::symmetrize`]; every distribution
/// vector in this crate is indexed by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndirectedGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    adj: Vec<Vec<usize>>,
}

impl UndirectedGraph {
    /// Validate and symmetrize raw adjacency, rejecting unknown ids.
    pub fn symmetrize<K, N, S>(raw: impl IntoIterator<Item = (K, N)>, node_ids: &[S]) -> Result<Self>
    where
        K: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
        S: AsRef<str>,
    {
        Self::symmetrize_with(raw, node_ids, UnknownNodePolicy::Reject).map(|(g, _)| g)
    }

    /// Validate and symmetrize raw adjacency.
    ///
    /// Every edge ends up present in both directions. Nodes without an adjacency entry are
    /// isolated. A self reference is kept as a self-loop. Asymmetric input is repaired and
    /// reported through a `warn!` event.
    pub fn symmetrize_with<K, N, S>(
        raw: impl IntoIterator<Item = (K, N)>,
        node_ids: &[S],
        policy: UnknownNodePolicy,
    ) -> Result<(Self, SymmetrizeReport)>
    where
        K: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
        S: AsRef<str>,
    {
        if node_ids.is_empty() {
            return Err(InvalidGraphError::EmptyNodeSet.into());
        }

        let mut ids = Vec::with_capacity(node_ids.len());
        let mut index = HashMap::with_capacity(node_ids.len());
        for id in node_ids {
            let id = id.as_ref();
            if index.insert(id.to_string(), ids.len()).is_some() {
                return Err(InvalidGraphError::DuplicateNode(id.to_string()).into());
            }
            ids.push(id.to_string());
        }

        let n = ids.len();
        let mut report = SymmetrizeReport::default();
        let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (key, nbrs) in raw {
            let key = key.as_ref();
            let Some(&u) = index.get(key) else {
                match policy {
                    UnknownNodePolicy::Reject => {
                        return Err(InvalidGraphError::UnknownAdjacencyKey(key.to_string()).into())
                    }
                    UnknownNodePolicy::Drop => {
                        report.dropped_refs += nbrs.into_iter().count();
                        continue;
                    }
                }
            };
            for nbr in nbrs {
                let nbr = nbr.as_ref();
                match index.get(nbr) {
                    Some(&v) => out[u].push(v),
                    None => match policy {
                        UnknownNodePolicy::Reject => {
                            return Err(InvalidGraphError::UnknownNeighbor {
                                node: key.to_string(),
                                neighbor: nbr.to_string(),
                            }
                            .into())
                        }
                        UnknownNodePolicy::Drop => report.dropped_refs += 1,
                    },
                }
            }
        }

        for nbrs in &mut out {
            let before = nbrs.len();
            nbrs.sort_unstable();
            nbrs.dedup();
            report.duplicate_refs += before - nbrs.len();
        }

        let mut adj = out.clone();
        for (u, nbrs) in out.iter().enumerate() {
            for &v in nbrs {
                if out[v].binary_search(&u).is_err() {
                    adj[v].push(u);
                    report.mirrored_edges += 1;
                }
            }
        }
        for nbrs in &mut adj {
            nbrs.sort_unstable();
        }

        if report.mirrored_edges > 0 {
            warn!(mirrored = report.mirrored_edges, "asymmetric adjacency; mirrored one-way edges");
        }
        if report.dropped_refs > 0 {
            warn!(dropped = report.dropped_refs, "dropped adjacency references to unknown nodes");
        }

        Ok((Self { ids, index, adj }, report))
    }

    pub fn node_ids(&self) -> &[String] {
        &self.ids
    }

    pub fn node_id(&self, node: usize) -> Option<&str> {
        self.ids.get(node).map(String::as_str)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Neighbor ids of `id`, in node order. `None` for unknown ids.
    pub fn neighbors(&self, id: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let u = self.index_of(id)?;
        Some(self.adj[u].iter().map(|&v| self.ids[v].as_str()))
    }

    pub fn degree(&self, node: usize) -> usize {
        self.out_degree(node)
    }

    pub fn degrees(&self) -> Vec<usize> {
        self.adj.iter().map(Vec::len).collect()
    }

    /// Export as raw adjacency keyed by id (every node present, possibly with no neighbors).
    ///
    /// Feeding this back into `symmetrize` with the same node order yields an equal graph.
    pub fn to_adjacency(&self) -> BTreeMap<String, Vec<String>> {
        self.ids
            .iter()
            .zip(&self.adj)
            .map(|(id, nbrs)| (id.clone(), nbrs.iter().map(|&v| self.ids[v].clone()).collect()))
            .collect()
    }

    pub fn is_symmetric(&self) -> bool {
        self.adj
            .iter()
            .enumerate()
            .all(|(u, nbrs)| nbrs.iter().all(|&v| self.adj[v].binary_search(&u).is_ok()))
    }
}

impl GraphRef for UndirectedGraph {
    fn node_count(&self) -> usize {
        self.ids.len()
    }

    fn neighbors_ref(&self, node: usize) -> &[usize] {
        self.adj.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}
