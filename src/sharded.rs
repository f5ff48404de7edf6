//! Sharded Cache
//!
//! Fan-out of N cache engines selected by FNV-1a key hash. Sharding bounds
//! per-engine state and lock contention: every scalar operation touches
//! exactly one shard, batched operations group keys by shard and dispatch in
//! parallel, and metrics aggregate across shards on demand.
//!
//! When a GC interval is configured, the shards themselves are built with GC
//! disabled and a single central ticker sweeps all of them, so no shard is
//! swept twice.

use crate::cache::{Cache, CacheConfig, MemStats};
use crate::metrics::MetricsSnapshot;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default number of shards
pub const DEFAULT_SHARD_COUNT: usize = 32;

/// Per-shard statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShardStat {
    pub shard: usize,
    pub len: usize,
    pub cost: i64,
}

/// A cache split into independent engines by key hash
pub struct ShardedCache<V> {
    shards: Arc<Vec<Cache<V>>>,
    gc_ticker: Mutex<Option<(mpsc::Sender<()>, JoinHandle<()>)>>,
    closed: AtomicBool,
}

/// FNV-1a 32-bit hash, the shard-selection hash.
pub(crate) fn fnv32a(key: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

impl<V: Clone + Send + Sync + 'static> ShardedCache<V> {
    /// Create a sharded cache. A zero `shard_count` falls back to
    /// [`DEFAULT_SHARD_COUNT`]. The cost budget and counter capacity in
    /// `config` are split evenly across shards.
    pub fn new(shard_count: usize, config: CacheConfig<V>) -> Self {
        let shard_count = if shard_count == 0 {
            DEFAULT_SHARD_COUNT
        } else {
            shard_count
        };

        let gc_interval = config.gc_interval;
        let mut shard_config = config;
        if shard_config.max_cost > 0 {
            shard_config.max_cost /= shard_count as i64;
        }
        if shard_config.num_counters > 0 {
            shard_config.num_counters /= shard_count as i64;
        }
        // GC runs centrally; individual shards must not double-sweep.
        shard_config.gc_interval = None;

        let shards: Arc<Vec<Cache<V>>> = Arc::new(
            (0..shard_count)
                .map(|_| Cache::new(shard_config.clone()))
                .collect(),
        );

        let gc_ticker = gc_interval.map(|interval| {
            let shards = Arc::clone(&shards);
            let (tx, rx) = mpsc::channel();
            let handle = std::thread::spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        for shard in shards.iter() {
                            shard.do_gc();
                        }
                    }
                    _ => break,
                }
            });
            (tx, handle)
        });

        Self {
            shards,
            gc_ticker: Mutex::new(gc_ticker),
            closed: AtomicBool::new(false),
        }
    }

    fn shard(&self, key: &str) -> &Cache<V> {
        let idx = fnv32a(key) as usize % self.shards.len();
        &self.shards[idx]
    }

    /// Enqueue a set on the owning shard.
    pub fn set(&self, key: impl Into<String>, value: V, cost: i64) -> bool {
        let key = key.into();
        self.shard(&key).set(key, value, cost)
    }

    /// Enqueue an expiring set on the owning shard.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, cost: i64, ttl: Duration) -> bool {
        let key = key.into();
        self.shard(&key).set_with_ttl(key, value, cost, ttl)
    }

    /// Look up a key on its shard.
    pub fn get(&self, key: &str) -> Option<V> {
        self.shard(key).get(key)
    }

    /// Look up a key with its remaining TTL.
    pub fn get_with_ttl(&self, key: &str) -> Option<(V, Duration)> {
        self.shard(key).get_with_ttl(key)
    }

    /// Remaining TTL of a key.
    pub fn get_ttl(&self, key: &str) -> Option<Duration> {
        self.shard(key).get_ttl(key)
    }

    /// Presence check without refreshing recency.
    pub fn exists(&self, key: &str) -> bool {
        self.shard(key).exists(key)
    }

    /// Compare-and-swap on the owning shard.
    pub fn cas(&self, key: &str, old: &V, new: V, cost: i64) -> bool
    where
        V: PartialEq,
    {
        self.shard(key).cas(key, old, new, cost)
    }

    /// Remove a key immediately.
    pub fn del(&self, key: &str) {
        self.shard(key).del(key)
    }

    /// Look up many keys, dispatching to shards in parallel. Only found
    /// keys appear in the result.
    pub fn mget<I, S>(&self, keys: I) -> HashMap<String, V>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_shard: Vec<Vec<String>> = vec![Vec::new(); self.shards.len()];
        for key in keys {
            let key = key.as_ref().to_string();
            let idx = fnv32a(&key) as usize % self.shards.len();
            by_shard[idx].push(key);
        }

        by_shard
            .into_par_iter()
            .enumerate()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(idx, keys)| self.shards[idx].mget(keys))
            .reduce(HashMap::new, |mut merged, partial| {
                merged.extend(partial);
                merged
            })
    }

    /// Set many values at `default_cost` each, dispatching to shards in
    /// parallel. Returns the number of accepted sets.
    pub fn mset(&self, items: HashMap<String, V>, default_cost: i64) -> usize {
        let mut by_shard: Vec<HashMap<String, V>> = vec![HashMap::new(); self.shards.len()];
        for (key, value) in items {
            let idx = fnv32a(&key) as usize % self.shards.len();
            by_shard[idx].insert(key, value);
        }

        by_shard
            .into_par_iter()
            .enumerate()
            .filter(|(_, items)| !items.is_empty())
            .map(|(idx, items)| self.shards[idx].mset(items, default_cost))
            .sum()
    }

    /// Set many values with individual costs, dispatching to shards in
    /// parallel. Returns the number of accepted sets.
    pub fn mset_with_costs(&self, items: HashMap<String, (V, i64)>) -> usize {
        let mut by_shard: Vec<HashMap<String, (V, i64)>> =
            vec![HashMap::new(); self.shards.len()];
        for (key, pair) in items {
            let idx = fnv32a(&key) as usize % self.shards.len();
            by_shard[idx].insert(key, pair);
        }

        by_shard
            .into_par_iter()
            .enumerate()
            .filter(|(_, items)| !items.is_empty())
            .map(|(idx, items)| self.shards[idx].mset_with_costs(items))
            .sum()
    }

    /// Drain every shard's admission queue.
    pub fn wait(&self) {
        self.shards.par_iter().for_each(|shard| shard.wait());
    }

    /// Remove every entry from every shard.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.clear();
        }
    }

    /// Close every shard and stop the central GC ticker. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some((stop, handle)) = self.gc_ticker.lock().take() {
            drop(stop);
            let _ = handle.join();
        }
        self.shards.par_iter().for_each(|shard| shard.close());
    }

    /// Total number of resident entries.
    pub fn len(&self) -> usize {
        self.shards.iter().map(Cache::len).sum()
    }

    /// Whether every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total cost across shards.
    pub fn cost(&self) -> i64 {
        self.shards.iter().map(Cache::cost).sum()
    }

    /// Number of shards.
    pub fn shard_len(&self) -> usize {
        self.shards.len()
    }

    /// Counters summed over all shards.
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut total = MetricsSnapshot::default();
        for shard in self.shards.iter() {
            total.merge(&shard.metrics().snapshot());
        }
        total
    }

    /// Per-shard statistics.
    pub fn shard_stats(&self) -> Vec<ShardStat> {
        self.shards
            .iter()
            .enumerate()
            .map(|(shard, cache)| ShardStat {
                shard,
                len: cache.len(),
                cost: cache.cost(),
            })
            .collect()
    }

    /// Memory statistics aggregated over all shards.
    pub fn mem_stats(&self) -> MemStats {
        let mut total = MemStats {
            len: 0,
            cost: 0,
            max_cost: 0,
            cost_percent: 0,
        };
        for shard in self.shards.iter() {
            let stats = shard.mem_stats();
            total.len += stats.len;
            total.cost += stats.cost;
            total.max_cost += stats.max_cost;
        }
        if total.max_cost > 0 {
            total.cost_percent = total.cost * 100 / total.max_cost;
        }
        total
    }
}

impl<V> Drop for ShardedCache<V> {
    fn drop(&mut self) {
        if let Some((stop, handle)) = self.gc_ticker.lock().take() {
            drop(stop);
            let _ = handle.join();
        }
        // Each shard joins its own workers in its Drop.
    }
}
