//! Shared Vector Types and the Index Contract
//!
//! The data model shared by the flat and HNSW indexes and the vector store
//! facade: dense f32 vectors keyed by string ID, optional JSON metadata, and
//! the [`VectorIndex`] trait both index implementations serve.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base per-item overhead charged against the cache budget, in bytes
const ITEM_BASE_COST: i64 = 64;
/// Flat estimate charged for attached metadata, in bytes
const METADATA_COST: i64 = 128;

/// A stored vector with its ID, optional metadata, and accounted cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorItem {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Memory cost in bytes charged against the owning cache shard.
    #[serde(skip)]
    pub cost: i64,
}

impl VectorItem {
    /// Build an item, computing its cost from the vector dimension and
    /// metadata presence.
    pub fn new(id: impl Into<String>, vector: Vec<f32>, metadata: Option<Value>) -> Self {
        let cost = item_cost(vector.len(), metadata.is_some());
        Self {
            id: id.into(),
            vector,
            metadata,
            cost,
        }
    }
}

/// Cost of a vector item: 4 bytes per dimension plus fixed overheads.
pub fn item_cost(dimension: usize, has_metadata: bool) -> i64 {
    let mut cost = dimension as i64 * 4 + ITEM_BASE_COST;
    if has_metadata {
        cost += METADATA_COST;
    }
    cost
}

/// One nearest-neighbor match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub vector: Vec<f32>,
    /// Distance for L2/cosine (smaller is better); true inner product for
    /// the IP metric (larger is better).
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Predicate over an item's metadata, used by filtered search
pub type MetadataFilter = dyn Fn(Option<&Value>) -> bool + Send + Sync;

/// Contract served by both the flat and HNSW indexes.
///
/// Implementations are internally synchronized: searches may run
/// concurrently, writes are exclusive.
pub trait VectorIndex: Send + Sync {
    /// Insert a vector, replacing the stored vector/metadata when the ID
    /// already exists.
    fn add(&self, id: &str, vector: Vec<f32>, metadata: Option<Value>) -> Result<()>;

    /// Fetch a live item by ID.
    fn get(&self, id: &str) -> Option<VectorItem>;

    /// Remove an ID. Returns whether a live item was removed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Return up to `k` nearest neighbors of `query`, best-first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Like [`search`](Self::search), keeping only results whose metadata
    /// passes `filter`.
    fn search_with_filter(
        &self,
        query: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>>;

    /// Number of live items.
    fn len(&self) -> usize;

    /// Whether the index holds no live items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove everything.
    fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_cost() {
        assert_eq!(item_cost(8, false), 8 * 4 + 64);
        assert_eq!(item_cost(8, true), 8 * 4 + 64 + 128);
    }

    #[test]
    fn test_vector_item_new() {
        let item = VectorItem::new("a", vec![0.0; 16], Some(json!({"tag": "x"})));
        assert_eq!(item.id, "a");
        assert_eq!(item.cost, 16 * 4 + 64 + 128);

        let bare = VectorItem::new("b", vec![0.0; 16], None);
        assert_eq!(bare.cost, 16 * 4 + 64);
    }

    #[test]
    fn test_item_serde_skips_cost() {
        let item = VectorItem::new("a", vec![1.0, 2.0], None);
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("cost").is_none());
        assert!(json.get("metadata").is_none());
        assert_eq!(json["id"], "a");
    }
}
