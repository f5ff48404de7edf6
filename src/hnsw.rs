//! Hierarchical Navigable Small World (HNSW) Index
//!
//! Approximate nearest-neighbor search over a multi-layer proximity graph.
//! Upper layers are sparse and navigated greedily; layer 0 holds every node
//! and is searched with a bounded beam. Expected query cost is logarithmic
//! in the number of vectors.
//!
//! # Key Parameters
//!
//! - **m**: edge cap per node per layer (default 16). Higher improves recall
//!   at the price of memory and insert time.
//! - **ef_construction**: beam width while inserting (default 200).
//! - **ef_search**: minimum beam width while querying (default 50).
//! - **level_mult**: multiplier of the exponential level distribution
//!   (default `1/ln 2`).
//!
//! # Structure
//!
//! Nodes live in a single id-keyed arena; neighbor lists hold ids, never
//! references, so the graph has no ownership cycles. Deletion is logical: a
//! deleted node keeps its edges and stays navigable but is never returned
//! from a search. Pruning an overfull neighbor list does not remove the
//! reverse edges, so the graph may be asymmetric after pruning; this matches
//! the standard formulation, where reverse-edge cleanup is a separate pass.
//!
//! # Thread Safety
//!
//! The whole graph sits behind one reader/writer lock: searches share the
//! read side, mutation takes the write side.

use crate::distance::Metric;
use crate::error::Result;
use crate::vector::{MetadataFilter, SearchResult, VectorIndex, VectorItem};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

/// Hard cap on node levels
const MAX_LEVEL: usize = 32;

/// HNSW configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum connections per node per layer (default: 16)
    pub m: usize,
    /// Beam width during construction (default: 200)
    pub ef_construction: usize,
    /// Minimum beam width during search (default: 50)
    pub ef_search: usize,
    /// Level multiplier (default: 1/ln 2)
    pub level_mult: f64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            level_mult: 1.0 / std::f64::consts::LN_2,
        }
    }
}

impl HnswConfig {
    /// Set the edge cap per layer
    #[must_use]
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    /// Set the construction beam width
    #[must_use]
    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    /// Set the search beam width floor
    #[must_use]
    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    /// Set the level multiplier
    #[must_use]
    pub fn with_level_mult(mut self, level_mult: f64) -> Self {
        self.level_mult = level_mult;
        self
    }

    fn normalized(mut self) -> Self {
        if self.m == 0 {
            self.m = 16;
        }
        if self.ef_construction == 0 {
            self.ef_construction = 200;
        }
        if self.ef_search == 0 {
            self.ef_search = 50;
        }
        if self.level_mult <= 0.0 {
            self.level_mult = 1.0 / std::f64::consts::LN_2;
        }
        self
    }
}

/// Graph statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswStats {
    /// Live (non-deleted) nodes
    pub num_vectors: usize,
    /// Tombstoned nodes still in the graph
    pub num_deleted: usize,
    /// Highest level currently in use (-1 when empty)
    pub max_level: i32,
    /// Total directed edges across all layers
    pub total_edges: usize,
    pub entry_point: Option<String>,
}

struct HnswNode {
    vector: Vec<f32>,
    metadata: Option<Value>,
    /// Per-level neighbor sets; index = level, length = node level + 1.
    neighbors: Vec<HashSet<String>>,
    deleted: bool,
}

impl HnswNode {
    fn new(vector: Vec<f32>, metadata: Option<Value>, level: usize) -> Self {
        Self {
            vector,
            metadata,
            neighbors: vec![HashSet::new(); level + 1],
            deleted: false,
        }
    }
}

struct HnswState {
    nodes: HashMap<String, HnswNode>,
    entry_point: Option<String>,
    max_level: i32,
    /// Live node count (deleted nodes excluded).
    count: usize,
}

/// HNSW index for approximate nearest-neighbor search
pub struct HnswIndex {
    config: HnswConfig,
    metric: Metric,
    state: RwLock<HnswState>,
}

impl HnswIndex {
    /// Create an index with the given configuration and metric. Zero or
    /// negative parameters fall back to their defaults.
    pub fn new(config: HnswConfig, metric: Metric) -> Self {
        Self {
            config: config.normalized(),
            metric,
            state: RwLock::new(HnswState {
                nodes: HashMap::new(),
                entry_point: None,
                max_level: -1,
                count: 0,
            }),
        }
    }

    /// Create an index with default parameters.
    pub fn with_metric(metric: Metric) -> Self {
        Self::new(HnswConfig::default(), metric)
    }

    /// The active configuration.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// The configured distance metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Draw a level from the exponential distribution
    /// `level = floor(-ln(u) * level_mult)`, capped at 32.
    fn random_level(&self) -> usize {
        let u: f64 = rand::thread_rng().gen_range(f64::MIN_POSITIVE..1.0);
        let level = (-u.ln() * self.config.level_mult) as usize;
        level.min(MAX_LEVEL)
    }

    /// Graph statistics.
    pub fn stats(&self) -> HnswStats {
        let state = self.state.read();
        let total_edges = state
            .nodes
            .values()
            .map(|n| n.neighbors.iter().map(HashSet::len).sum::<usize>())
            .sum();
        HnswStats {
            num_vectors: state.count,
            num_deleted: state.nodes.len() - state.count,
            max_level: state.max_level,
            total_edges,
            entry_point: state.entry_point.clone(),
        }
    }

    /// Search with an explicit beam width instead of the configured
    /// `ef_search` floor.
    pub fn search_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Vec<SearchResult> {
        let state = self.state.read();
        self.search_locked(&state, query, k, ef.max(k), None)
    }

    fn search_locked(
        &self,
        state: &HnswState,
        query: &[f32],
        k: usize,
        ef: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<SearchResult> {
        let Some(entry) = state.entry_point.clone() else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        // Greedy single-neighbor descent through the upper layers.
        let mut current = entry;
        for level in (1..=state.max_level.max(0) as usize).rev() {
            let nearest = search_layer(state, query, &current, 1, level, self.metric);
            if let Some((id, _)) = nearest.first() {
                current = id.clone();
            }
        }

        // Beam search at layer 0.
        let candidates = search_layer(state, query, &current, ef, 0, self.metric);

        let mut results = Vec::with_capacity(k);
        for (id, dist) in candidates {
            if results.len() >= k {
                break;
            }
            let Some(node) = state.nodes.get(&id) else {
                continue;
            };
            if node.deleted {
                continue;
            }
            if let Some(f) = filter {
                if !f(node.metadata.as_ref()) {
                    continue;
                }
            }
            results.push(SearchResult {
                id,
                vector: node.vector.clone(),
                score: if self.metric == Metric::Ip { -dist } else { dist },
                metadata: node.metadata.clone(),
            });
        }
        results
    }
}

/// Beam search over one layer, returning `(id, distance)` pairs in ascending
/// distance order. The entry node seeds the result set regardless of its
/// deleted flag; callers filter tombstones at emission. Deleted neighbors
/// are not traversed.
fn search_layer(
    state: &HnswState,
    query: &[f32],
    entry: &str,
    ef: usize,
    level: usize,
    metric: Metric,
) -> Vec<(String, f32)> {
    let Some(entry_node) = state.nodes.get(entry) else {
        return Vec::new();
    };

    let mut visited: HashSet<String> = HashSet::new();
    // Min-heap over candidates by distance.
    let mut candidates: BinaryHeap<Reverse<(OrderedFloat<f32>, String)>> = BinaryHeap::new();
    // Max-heap over results, bounded by ef.
    let mut results: BinaryHeap<(OrderedFloat<f32>, String)> = BinaryHeap::new();

    let entry_dist = metric.compute(query, &entry_node.vector);
    visited.insert(entry.to_string());
    candidates.push(Reverse((OrderedFloat(entry_dist), entry.to_string())));
    results.push((OrderedFloat(entry_dist), entry.to_string()));

    while let Some(Reverse((OrderedFloat(dist), id))) = candidates.pop() {
        let worst = results
            .peek()
            .map(|(d, _)| d.0)
            .unwrap_or(f32::INFINITY);
        if dist > worst && results.len() >= ef {
            break;
        }

        let Some(node) = state.nodes.get(&id) else {
            continue;
        };
        let Some(neighbors) = node.neighbors.get(level) else {
            continue;
        };

        for neighbor_id in neighbors {
            if visited.contains(neighbor_id) {
                continue;
            }
            let Some(neighbor) = state.nodes.get(neighbor_id) else {
                continue;
            };
            if neighbor.deleted {
                continue;
            }
            visited.insert(neighbor_id.clone());

            let neighbor_dist = metric.compute(query, &neighbor.vector);
            candidates.push(Reverse((OrderedFloat(neighbor_dist), neighbor_id.clone())));
            if results.len() < ef {
                results.push((OrderedFloat(neighbor_dist), neighbor_id.clone()));
            } else if neighbor_dist < worst {
                results.pop();
                results.push((OrderedFloat(neighbor_dist), neighbor_id.clone()));
            }
        }
    }

    let mut sorted: Vec<(String, f32)> = results
        .into_iter()
        .map(|(d, id)| (id, d.0))
        .collect();
    sorted.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Keep only the `m` closest neighbors of `id` at `level`. One-directional:
/// dropped reverse edges are left in place.
fn prune_neighbors(state: &mut HnswState, id: &str, level: usize, m: usize, metric: Metric) {
    let over = match state.nodes.get(id) {
        Some(node) => node
            .neighbors
            .get(level)
            .map(|n| n.len() > m)
            .unwrap_or(false),
        None => false,
    };
    if !over {
        return;
    }

    let node = &state.nodes[id];
    let mut scored: Vec<(String, f32)> = node.neighbors[level]
        .iter()
        .filter_map(|nid| {
            state
                .nodes
                .get(nid)
                .map(|n| (nid.clone(), metric.compute(&node.vector, &n.vector)))
        })
        .collect();
    scored.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(m);

    let keep: HashSet<String> = scored.into_iter().map(|(nid, _)| nid).collect();
    if let Some(node) = state.nodes.get_mut(id) {
        node.neighbors[level] = keep;
    }
}

impl VectorIndex for HnswIndex {
    fn add(&self, id: &str, vector: Vec<f32>, metadata: Option<Value>) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        // Overwrite in place without touching the topology. A tombstoned
        // node comes back to life here; its stale edges remain valid.
        if let Some(node) = state.nodes.get_mut(id) {
            node.vector = vector;
            node.metadata = metadata;
            if node.deleted {
                node.deleted = false;
                state.count += 1;
            }
            return Ok(());
        }

        let level = self.random_level();
        let node = HnswNode::new(vector, metadata, level);

        // First node becomes the entry point.
        if state.entry_point.is_none() {
            state.entry_point = Some(id.to_string());
            state.max_level = level as i32;
            state.nodes.insert(id.to_string(), node);
            state.count += 1;
            return Ok(());
        }

        let query = node.vector.clone();
        state.nodes.insert(id.to_string(), node);

        let mut current = state
            .entry_point
            .clone()
            .unwrap_or_else(|| id.to_string());
        let max_level = state.max_level.max(0) as usize;

        // Greedy descent above the insertion level.
        for l in (level + 1..=max_level).rev() {
            let nearest = search_layer(state, &query, &current, 1, l, self.metric);
            if let Some((nid, _)) = nearest.first() {
                current = nid.clone();
            }
        }

        // Wire the node into every layer at or below its level.
        for l in (0..=level.min(max_level)).rev() {
            let candidates = search_layer(
                state,
                &query,
                &current,
                self.config.ef_construction,
                l,
                self.metric,
            );

            for (cid, _) in &candidates {
                if cid == id {
                    continue;
                }
                if let Some(node) = state.nodes.get_mut(id) {
                    node.neighbors[l].insert(cid.clone());
                }
                prune_neighbors(state, id, l, self.config.m, self.metric);

                if let Some(candidate) = state.nodes.get_mut(cid.as_str()) {
                    if l < candidate.neighbors.len() {
                        candidate.neighbors[l].insert(id.to_string());
                    }
                }
                prune_neighbors(state, cid, l, self.config.m, self.metric);
            }

            if let Some((nid, _)) = candidates.first() {
                current = nid.clone();
            }
        }

        if level as i32 > state.max_level {
            state.entry_point = Some(id.to_string());
            state.max_level = level as i32;
        }
        state.count += 1;
        Ok(())
    }

    fn get(&self, id: &str) -> Option<VectorItem> {
        let state = self.state.read();
        let node = state.nodes.get(id)?;
        if node.deleted {
            return None;
        }
        Some(VectorItem::new(
            id,
            node.vector.clone(),
            node.metadata.clone(),
        ))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        match state.nodes.get_mut(id) {
            Some(node) if !node.deleted => {
                node.deleted = true;
                state.count -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let ef = self.config.ef_search.max(k);
        let state = self.state.read();
        Ok(self.search_locked(&state, query, k, ef, None))
    }

    fn search_with_filter(
        &self,
        query: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        // Widen the beam to compensate for filter-induced pruning.
        let ef = self.config.ef_search.max(k * 2);
        let state = self.state.read();
        Ok(self.search_locked(&state, query, k, ef, Some(filter)))
    }

    fn len(&self) -> usize {
        self.state.read().count
    }

    fn clear(&self) {
        let mut state = self.state.write();
        debug!(nodes = state.nodes.len(), "clearing hnsw graph");
        state.nodes.clear();
        state.entry_point = None;
        state.max_level = -1;
        state.count = 0;
    }
}
