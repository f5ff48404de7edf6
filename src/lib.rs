//! # Hoard - Embedded Caching Vector Store
//!
//! Hoard is an in-process key/value cache fused with an in-memory vector
//! index. Applications embed it to cache arbitrary values under string keys
//! with a cost-bounded memory budget, TTL expiration, and frequency-aware
//! admission, and to store dense f32 vectors and retrieve nearest neighbors
//! under a configurable distance metric.
//!
//! ## Quick Start
//!
//! ```rust
//! use hoard::{Cache, CacheConfig};
//!
//! // A cost-bounded cache of strings.
//! let cache: Cache<String> = Cache::new(CacheConfig::default().with_max_cost(1 << 20));
//!
//! // Sets are admitted asynchronously; wait() gives read-after-write.
//! cache.set("user:42", "alice".to_string(), 16);
//! cache.wait();
//! assert_eq!(cache.get("user:42").as_deref(), Some("alice"));
//! cache.close();
//! ```
//!
//! ```rust
//! use hoard::{IndexType, Metric, VectorStore, VectorStoreConfig};
//! use serde_json::json;
//!
//! let store = VectorStore::new(
//!     VectorStoreConfig::default()
//!         .with_index_type(IndexType::Hnsw)
//!         .with_metric(Metric::Cosine),
//! );
//!
//! store.add("doc1", vec![0.1, 0.9, 0.0], Some(json!({"lang": "en"}))).unwrap();
//! store.add("doc2", vec![0.8, 0.1, 0.2], None).unwrap();
//! store.wait();
//!
//! let results = store.search(&[0.1, 0.9, 0.0], 1).unwrap();
//! assert_eq!(results[0].id, "doc1");
//! store.close();
//! ```
//!
//! ## Features
//!
//! - **TinyLFU admission**: sets pass through a non-blocking queue; near
//!   capacity, candidates displace sampled cold entries only when they are
//!   hotter
//! - **Cost budgeting**: every entry carries an integer cost; the store
//!   never exceeds its budget once the admission worker has quiesced
//! - **Sharding**: both the cache and the vector store fan out across
//!   independently locked shards selected by key hash
//! - **HNSW and flat indexes**: approximate graph search or exact scans
//!   behind one search contract, with logical deletion and filtered top-k
//! - **Export/import**: JSON envelope carrying the metric tag, index-type
//!   tag, and item array
//!
//! ## Consistency Model
//!
//! Within one shard, admission is FIFO: two sets of the same key from one
//! thread are observed in program order after [`Cache::wait`]. Across
//! shards there is no ordering guarantee. A `get` immediately after a `set`
//! may miss; call `wait` first when read-after-write matters.

pub mod cache;
pub mod distance;
pub mod error;
pub mod flat;
pub mod frequency;
pub mod hnsw;
pub mod lru;
pub mod metrics;
pub mod sharded;
pub mod store;
pub mod vector;

// Re-export main types at crate root
pub use cache::{Cache, CacheConfig, EvictionCallback, ExitCallback, MemStats};
pub use distance::{Metric, MAX_DISTANCE};
pub use error::{HoardError, Result};
pub use flat::FlatIndex;
pub use frequency::Frequency;
pub use hnsw::{HnswConfig, HnswIndex, HnswStats};
pub use lru::{CacheEntry, LruStore};
pub use metrics::{Metrics, MetricsSnapshot};
pub use sharded::{ShardStat, ShardedCache};
pub use store::{
    ExportData, IndexType, ItemCollector, ShardStoreStats, StoreStats, VectorStore,
    VectorStoreConfig,
};
pub use vector::{MetadataFilter, SearchResult, VectorIndex, VectorItem};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{Cache, CacheConfig};
    pub use crate::distance::Metric;
    pub use crate::error::{HoardError, Result};
    pub use crate::sharded::ShardedCache;
    pub use crate::store::{IndexType, VectorStore, VectorStoreConfig};
    pub use crate::vector::{SearchResult, VectorIndex, VectorItem};
}
