//! Cost-Tracking LRU Store
//!
//! The recency-ordered substrate for one cache shard: a key/entry container
//! where the head is the most-recently-used entry, total cost is tracked
//! against a budget, and reads can be expiration-aware without mutating.
//!
//! Built on [`lru::LruCache`] in unbounded mode — the crate handles recency
//! order, this layer adds cost accounting and TTL checks. The store itself
//! is not synchronized; the cache engine wraps it in a single reader/writer
//! lock.

use lru::LruCache;
use std::time::{Duration, Instant};

/// A single cache entry: owned payload plus cost and expiration
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub cost: i64,
    /// Monotonic deadline; `None` means the entry never expires.
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }

    /// Remaining TTL at `now`; zero when expired or when no deadline is set.
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

/// Lightweight descriptor of a stored entry, for samplers and sweepers
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub key: String,
    pub cost: i64,
    pub expires_at: Option<Instant>,
}

/// Outcome of [`LruStore::add`]
pub struct AddOutcome<V> {
    /// Previous payload when the key already existed.
    pub replaced: Option<V>,
    /// Entries removed from the tail to get back under budget.
    pub evicted: Vec<(String, CacheEntry<V>)>,
}

/// Ordered key/entry container with cost accounting
pub struct LruStore<V> {
    entries: LruCache<String, CacheEntry<V>>,
    cost: i64,
    max_cost: i64,
}

impl<V> LruStore<V> {
    /// Create a store bounded by `max_cost`.
    pub fn new(max_cost: i64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            cost: 0,
            max_cost,
        }
    }

    /// Insert or update `key`, moving it to the head. After insertion, tail
    /// entries are removed while the total cost exceeds the budget; they are
    /// returned so the caller can account for them.
    pub fn add(
        &mut self,
        key: String,
        value: V,
        cost: i64,
        expires_at: Option<Instant>,
    ) -> AddOutcome<V> {
        let entry = CacheEntry { value, cost, expires_at };
        let replaced = self.entries.put(key, entry).map(|old| {
            self.cost -= old.cost;
            old.value
        });
        self.cost += cost;

        let mut evicted = Vec::new();
        while self.cost > self.max_cost && !self.entries.is_empty() {
            if let Some(victim) = self.evict_oldest() {
                evicted.push(victim);
            } else {
                break;
            }
        }

        AddOutcome { replaced, evicted }
    }

    /// Read without reordering. Expired entries report a miss but are left in
    /// place; cleanup happens under the write path.
    pub fn get(&self, key: &str) -> Option<&CacheEntry<V>> {
        let entry = self.entries.peek(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry)
    }

    /// Read and promote to the head. An expired entry is removed and reported
    /// as a miss.
    pub fn get_and_update(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        let expired = self
            .entries
            .peek(key)
            .map(|e| e.is_expired(Instant::now()))?;
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key)
    }

    /// Detach `key`, returning its entry.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.pop(key)?;
        self.cost -= entry.cost;
        Some(entry)
    }

    /// Remove `key` only if it is past its deadline at `now`.
    pub fn remove_if_expired(&mut self, key: &str, now: Instant) -> Option<CacheEntry<V>> {
        if self.entries.peek(key)?.is_expired(now) {
            self.remove(key)
        } else {
            None
        }
    }

    /// Remove and return the least-recently-used entry.
    pub fn evict_oldest(&mut self) -> Option<(String, CacheEntry<V>)> {
        let (key, entry) = self.entries.pop_lru()?;
        self.cost -= entry.cost;
        Some((key, entry))
    }

    /// Snapshot of entry descriptors, head (MRU) first.
    pub fn items(&self) -> Vec<EntryInfo> {
        self.entries
            .iter()
            .map(|(key, entry)| EntryInfo {
                key: key.clone(),
                cost: entry.cost,
                expires_at: entry.expires_at,
            })
            .collect()
    }

    /// Up to `n` resident keys, in iteration order.
    pub fn sample_keys(&self, n: usize) -> Vec<String> {
        self.entries.iter().take(n).map(|(k, _)| k.clone()).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current total cost of resident entries.
    pub fn cost(&self) -> i64 {
        self.cost
    }

    pub fn max_cost(&self) -> i64 {
        self.max_cost
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cost = 0;
    }
}
