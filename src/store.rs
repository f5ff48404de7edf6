//! Vector Store
//!
//! Binds a cost-bounded cache shard to a vector index behind one facade:
//! the cache owns the canonical `VectorItem` payloads under its budget, the
//! index answers nearest-neighbor queries. With `shard_count > 1` the store
//! owns N inner single-shard stores, each with `max_cost / N`, and fans
//! searches out to all of them in parallel, merging the per-shard top-k.
//!
//! Every shard also keeps an authoritative id -> item side table so that
//! index rebuilds are self-contained; when the cache evicts a vector entry
//! to stay under budget, an internal hook logically deletes the id from the
//! index and side table, keeping all three views consistent. An externally
//! installed item collector overrides the side table for
//! [`VectorStore::get_all_items`] and export.
//!
//! # Example
//!
//! ```
//! use hoard::store::{VectorStore, VectorStoreConfig, IndexType};
//! use hoard::distance::Metric;
//!
//! let store = VectorStore::new(
//!     VectorStoreConfig::default()
//!         .with_index_type(IndexType::Hnsw)
//!         .with_metric(Metric::Cosine),
//! );
//!
//! store.add("doc1", vec![0.1, 0.2, 0.3], None).unwrap();
//! store.wait();
//! let results = store.search(&[0.1, 0.2, 0.3], 1).unwrap();
//! assert_eq!(results[0].id, "doc1");
//! store.close();
//! ```

use crate::cache::{Cache, CacheConfig};
use crate::distance::Metric;
use crate::error::{HoardError, Result};
use crate::flat::FlatIndex;
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::sharded::fnv32a;
use crate::vector::{MetadataFilter, SearchResult, VectorIndex, VectorItem};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Key prefix under which vector items live in the cache
const VEC_KEY_PREFIX: &str = "vec:";

/// Which index implementation a store uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Brute-force scan; exact results
    #[default]
    Flat,
    /// HNSW graph; approximate results, sub-linear queries
    Hnsw,
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Hnsw => write!(f, "hnsw"),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub index_type: IndexType,
    pub hnsw: HnswConfig,
    pub metric: Metric,
    /// Total memory budget; split evenly across shards.
    pub max_cost: i64,
    /// Default TTL for the owning cache's expiration sweeper.
    pub ttl: Option<Duration>,
    pub shard_count: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            index_type: IndexType::Flat,
            hnsw: HnswConfig::default(),
            metric: Metric::L2,
            max_cost: 1 << 30,
            ttl: None,
            shard_count: 1,
        }
    }
}

impl VectorStoreConfig {
    /// Set the index implementation
    #[must_use]
    pub fn with_index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    /// Set the HNSW parameters
    #[must_use]
    pub fn with_hnsw(mut self, hnsw: HnswConfig) -> Self {
        self.hnsw = hnsw;
        self
    }

    /// Set the distance metric
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the total memory budget
    #[must_use]
    pub fn with_max_cost(mut self, max_cost: i64) -> Self {
        self.max_cost = max_cost;
        self
    }

    /// Set the default TTL
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the number of shards
    #[must_use]
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }
}

/// Collector supplying the full item set for rebuilds and export
pub type ItemCollector = Arc<dyn Fn() -> Vec<VectorItem> + Send + Sync>;

/// Point-in-time store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub len: usize,
    pub cost: i64,
    pub max_cost: i64,
    pub shard_count: usize,
    pub index_type: IndexType,
    pub metric: Metric,
    pub shards: Vec<ShardStoreStats>,
}

/// Statistics for one inner store shard
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShardStoreStats {
    pub len: usize,
    pub cost: i64,
}

/// Export envelope: metric tag, index-type tag, item array
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub metric: Metric,
    /// Kept as a free-form tag; unknown values are tolerated on import.
    pub index_type: String,
    pub items: Vec<VectorItem>,
}

struct StoreShard {
    cache: Cache<VectorItem>,
    index: Arc<dyn VectorIndex>,
    items: Arc<RwLock<HashMap<String, VectorItem>>>,
}

impl StoreShard {
    fn new(config: &VectorStoreConfig, max_cost: i64) -> Self {
        let index: Arc<dyn VectorIndex> = match config.index_type {
            IndexType::Hnsw => Arc::new(HnswIndex::new(config.hnsw.clone(), config.metric)),
            IndexType::Flat => Arc::new(FlatIndex::new(config.metric)),
        };
        let items: Arc<RwLock<HashMap<String, VectorItem>>> =
            Arc::new(RwLock::new(HashMap::new()));

        // Keep index and side table consistent with budget-driven eviction:
        // when the cache drops a vector entry, the id disappears from the
        // searchable set as well.
        let evict_index = Arc::clone(&index);
        let evict_items = Arc::clone(&items);
        let mut cache_config: CacheConfig<VectorItem> = CacheConfig::default()
            .with_max_cost(max_cost)
            .with_on_evict(Arc::new(move |key: &str, _item: &VectorItem, _cost: i64| {
                if let Some(id) = key.strip_prefix(VEC_KEY_PREFIX) {
                    let _ = evict_index.delete(id);
                    evict_items.write().remove(id);
                }
            }));
        if let Some(ttl) = config.ttl {
            cache_config = cache_config.with_ttl(ttl);
        }

        Self {
            cache: Cache::new(cache_config),
            index,
            items,
        }
    }

    fn add(&self, item: VectorItem) -> Result<()> {
        let id = item.id.clone();
        self.items.write().insert(id.clone(), item.clone());
        self.cache.set(
            format!("{}{}", VEC_KEY_PREFIX, id),
            item.clone(),
            item.cost,
        );
        self.index.add(&id, item.vector, item.metadata)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.items.write().remove(id);
        self.cache.del(&format!("{}{}", VEC_KEY_PREFIX, id));
        self.index.delete(id)
    }

    fn rebuild_index(&self) -> Result<()> {
        self.index.clear();
        let items: Vec<VectorItem> = self.items.read().values().cloned().collect();
        for item in items {
            self.index.add(&item.id, item.vector, item.metadata)?;
        }
        Ok(())
    }
}

/// Cache-backed vector store with a flat or HNSW index
pub struct VectorStore {
    config: VectorStoreConfig,
    shards: Vec<StoreShard>,
    collector: RwLock<Option<ItemCollector>>,
}

impl VectorStore {
    /// Create a store. A zero shard count becomes 1; the budget is split
    /// evenly across shards.
    pub fn new(config: VectorStoreConfig) -> Self {
        let mut config = config;
        if config.shard_count == 0 {
            config.shard_count = 1;
        }

        let per_shard_cost = config.max_cost / config.shard_count as i64;
        let shards = (0..config.shard_count)
            .map(|_| StoreShard::new(&config, per_shard_cost))
            .collect();

        Self {
            config,
            shards,
            collector: RwLock::new(None),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    fn shard(&self, id: &str) -> &StoreShard {
        let idx = fnv_shard(id, self.shards.len());
        &self.shards[idx]
    }

    /// Store a vector under `id`, replacing any previous item with that id.
    pub fn add(&self, id: impl Into<String>, vector: Vec<f32>, metadata: Option<Value>) -> Result<()> {
        let item = VectorItem::new(id, vector, metadata);
        self.shard(&item.id).add(item)
    }

    /// Store many vectors; stops at the first index failure.
    pub fn batch_add(&self, items: Vec<VectorItem>) -> Result<()> {
        for item in items {
            self.shard(&item.id).add(item)?;
        }
        Ok(())
    }

    /// Fetch an item by id, from the cache (refreshing its recency).
    pub fn get(&self, id: &str) -> Option<VectorItem> {
        self.shard(id)
            .cache
            .get(&format!("{}{}", VEC_KEY_PREFIX, id))
    }

    /// Fetch many items; only found ids appear in the result.
    pub fn batch_get(&self, ids: &[String]) -> HashMap<String, VectorItem> {
        let mut result = HashMap::new();
        for id in ids {
            if let Some(item) = self.get(id) {
                result.insert(id.clone(), item);
            }
        }
        result
    }

    /// Remove an item from the cache and index. Returns whether the index
    /// held a live item.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.shard(id).delete(id)
    }

    /// Remove many items, returning how many were live in the index.
    pub fn batch_delete(&self, ids: &[String]) -> usize {
        ids.iter()
            .filter(|id| self.delete(id).unwrap_or(false))
            .count()
    }

    /// Return up to `k` nearest neighbors, best-first. With multiple shards,
    /// each shard is asked for `2k` and the union is re-ranked.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.shards.len() == 1 {
            return self.shards[0].index.search(query, k);
        }

        let per_shard: Vec<Result<Vec<SearchResult>>> = self
            .shards
            .par_iter()
            .map(|shard| shard.index.search(query, k * 2))
            .collect();

        let mut merged = Vec::new();
        for shard_results in per_shard {
            merged.extend(shard_results?);
        }
        sort_results(&mut merged, self.config.metric);
        merged.truncate(k);
        Ok(merged)
    }

    /// Filtered nearest-neighbor search with the same fan-out as
    /// [`search`](Self::search).
    pub fn search_with_filter(
        &self,
        query: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        if self.shards.len() == 1 {
            return self.shards[0].index.search_with_filter(query, k, filter);
        }

        let per_shard: Vec<Result<Vec<SearchResult>>> = self
            .shards
            .par_iter()
            .map(|shard| shard.index.search_with_filter(query, k * 2, filter))
            .collect();

        let mut merged = Vec::new();
        for shard_results in per_shard {
            merged.extend(shard_results?);
        }
        sort_results(&mut merged, self.config.metric);
        merged.truncate(k);
        Ok(merged)
    }

    /// Number of live items in the index.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.index.len()).sum()
    }

    /// Whether the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total cost currently charged to the owning caches.
    pub fn cost(&self) -> i64 {
        self.shards.iter().map(|s| s.cache.cost()).sum()
    }

    /// Remove everything from every shard.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.cache.clear();
            shard.index.clear();
            shard.items.write().clear();
        }
    }

    /// Drain every shard's admission queue.
    pub fn wait(&self) {
        for shard in &self.shards {
            shard.cache.wait();
        }
    }

    /// Close every shard's cache. Idempotent.
    pub fn close(&self) {
        for shard in &self.shards {
            shard.cache.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.shards.iter().any(|s| s.cache.is_closed())
    }

    /// Rebuild every shard's index from its side table.
    pub fn build_index(&self) -> Result<()> {
        if self.is_closed() {
            return Err(HoardError::Closed);
        }
        for shard in &self.shards {
            shard.rebuild_index()?;
        }
        Ok(())
    }

    /// Optimize the index. For HNSW this re-inserts every item, re-drawing
    /// levels and re-wiring edges; the flat index needs no optimization.
    pub fn optimize_index(&self) -> Result<()> {
        match self.config.index_type {
            IndexType::Hnsw => self.build_index(),
            IndexType::Flat => Ok(()),
        }
    }

    /// Install a collector that overrides the internal side table for
    /// [`get_all_items`](Self::get_all_items) and export.
    pub fn set_item_collector(&self, collector: ItemCollector) {
        *self.collector.write() = Some(collector);
    }

    /// Every stored item: from the installed collector when present,
    /// otherwise from the side tables.
    pub fn get_all_items(&self) -> Vec<VectorItem> {
        if let Some(collector) = self.collector.read().as_ref() {
            return collector();
        }
        let mut items = Vec::new();
        for shard in &self.shards {
            items.extend(shard.items.read().values().cloned());
        }
        items
    }

    /// Export the full item set.
    pub fn export(&self) -> Vec<VectorItem> {
        self.get_all_items()
    }

    /// Replay `add` for every item, then drain the admission queues.
    pub fn import(&self, items: Vec<VectorItem>) -> Result<()> {
        if self.is_closed() {
            return Err(HoardError::Closed);
        }
        for item in items {
            self.add(item.id, item.vector, item.metadata)?;
        }
        self.wait();
        Ok(())
    }

    /// Serialize the store's items into the JSON envelope.
    pub fn export_to_bytes(&self) -> Result<Vec<u8>> {
        let data = ExportData {
            metric: self.config.metric,
            index_type: self.config.index_type.to_string(),
            items: self.export(),
        };
        Ok(serde_json::to_vec(&data)?)
    }

    /// Import items from the JSON envelope. A metric mismatch is tolerated
    /// with a warning; it may degrade search quality.
    pub fn import_from_bytes(&self, data: &[u8]) -> Result<()> {
        let parsed: ExportData = serde_json::from_slice(data)?;
        if parsed.metric != self.config.metric {
            warn!(
                imported = %parsed.metric,
                configured = %self.config.metric,
                "metric mismatch on import; search quality may degrade"
            );
        }
        // Envelope items carry no cost; recompute on add.
        self.import(
            parsed
                .items
                .into_iter()
                .map(|item| VectorItem::new(item.id, item.vector, item.metadata))
                .collect(),
        )
    }

    /// Statistics snapshot.
    pub fn get_stats(&self) -> StoreStats {
        StoreStats {
            len: self.len(),
            cost: self.cost(),
            max_cost: self.config.max_cost,
            shard_count: self.shards.len(),
            index_type: self.config.index_type,
            metric: self.config.metric,
            shards: self
                .shards
                .iter()
                .map(|s| ShardStoreStats {
                    len: s.index.len(),
                    cost: s.cache.cost(),
                })
                .collect(),
        }
    }
}

/// FNV-1a routing shared with the sharded cache.
fn fnv_shard(id: &str, shards: usize) -> usize {
    fnv32a(id) as usize % shards
}

/// Order merged results best-first: ascending score for distance metrics,
/// descending inner product for IP.
fn sort_results(results: &mut [SearchResult], metric: Metric) {
    if metric == Metric::Ip {
        results.sort_unstable_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        results.sort_unstable_by(|a, b| {
            a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}
