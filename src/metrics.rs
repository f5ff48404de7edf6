//! Cache Metrics
//!
//! Lock-free counters covering the full life of a cache entry: lookups
//! (hits/misses), admissions (keys and cost added), displacement (keys and
//! cost evicted), and the two set-path failure modes (rejected for cost,
//! dropped for queue pressure).
//!
//! Counters are plain relaxed atomics; reading them is cheap enough to do on
//! every request. [`Metrics::snapshot`] produces a serializable point-in-time
//! copy, and snapshots from multiple shards can be summed with
//! [`MetricsSnapshot::merge`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic cache counters
#[derive(Debug, Default)]
pub struct Metrics {
    hits: AtomicU64,
    misses: AtomicU64,
    keys_added: AtomicU64,
    keys_evicted: AtomicU64,
    sets_dropped: AtomicU64,
    sets_rejected: AtomicU64,
    cost_added: AtomicU64,
    cost_evicted: AtomicU64,
}

impl Metrics {
    /// Create a zeroed metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of cache misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of keys admitted into the store
    pub fn keys_added(&self) -> u64 {
        self.keys_added.load(Ordering::Relaxed)
    }

    /// Number of keys evicted from the store
    pub fn keys_evicted(&self) -> u64 {
        self.keys_evicted.load(Ordering::Relaxed)
    }

    /// Number of sets dropped because the admission queue was full
    pub fn sets_dropped(&self) -> u64 {
        self.sets_dropped.load(Ordering::Relaxed)
    }

    /// Number of sets rejected because their cost exceeded the budget
    pub fn sets_rejected(&self) -> u64 {
        self.sets_rejected.load(Ordering::Relaxed)
    }

    /// Total cost admitted
    pub fn cost_added(&self) -> u64 {
        self.cost_added.load(Ordering::Relaxed)
    }

    /// Total cost evicted
    pub fn cost_evicted(&self) -> u64 {
        self.cost_evicted.load(Ordering::Relaxed)
    }

    /// Hit ratio over all lookups, 0.0 when no lookups happened
    pub fn ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_key_added(&self) {
        self.keys_added.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set_dropped(&self) {
        self.sets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set_rejected(&self) {
        self.sets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cost_added(&self, cost: i64) {
        self.cost_added.fetch_add(cost.max(0) as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self, cost: i64) {
        self.keys_evicted.fetch_add(1, Ordering::Relaxed);
        self.cost_evicted.fetch_add(cost.max(0) as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            keys_added: self.keys_added(),
            keys_evicted: self.keys_evicted(),
            sets_dropped: self.sets_dropped(),
            sets_rejected: self.sets_rejected(),
            cost_added: self.cost_added(),
            cost_evicted: self.cost_evicted(),
        }
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hits={} misses={} ratio={:.2}% keys_added={} keys_evicted={} \
             sets_dropped={} sets_rejected={} cost_added={} cost_evicted={}",
            self.hits(),
            self.misses(),
            self.ratio() * 100.0,
            self.keys_added(),
            self.keys_evicted(),
            self.sets_dropped(),
            self.sets_rejected(),
            self.cost_added(),
            self.cost_evicted(),
        )
    }
}

/// Serializable snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub keys_added: u64,
    pub keys_evicted: u64,
    pub sets_dropped: u64,
    pub sets_rejected: u64,
    pub cost_added: u64,
    pub cost_evicted: u64,
}

impl MetricsSnapshot {
    /// Sum another snapshot into this one (for per-shard aggregation)
    pub fn merge(&mut self, other: &MetricsSnapshot) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.keys_added += other.keys_added;
        self.keys_evicted += other.keys_evicted;
        self.sets_dropped += other.sets_dropped;
        self.sets_rejected += other.sets_rejected;
        self.cost_added += other.cost_added;
        self.cost_evicted += other.cost_evicted;
    }

    /// Hit ratio over all lookups, 0.0 when no lookups happened
    pub fn ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let m = Metrics::new();
        m.record_hit();
        m.record_hit();
        m.record_miss();
        m.record_key_added();
        m.record_cost_added(10);
        m.record_eviction(4);

        assert_eq!(m.hits(), 2);
        assert_eq!(m.misses(), 1);
        assert_eq!(m.keys_added(), 1);
        assert_eq!(m.keys_evicted(), 1);
        assert_eq!(m.cost_added(), 10);
        assert_eq!(m.cost_evicted(), 4);
        assert!((m.ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_no_lookups() {
        let m = Metrics::new();
        assert_eq!(m.ratio(), 0.0);
    }

    #[test]
    fn test_snapshot_merge() {
        let a = Metrics::new();
        a.record_hit();
        a.record_set_dropped();
        let b = Metrics::new();
        b.record_miss();
        b.record_set_rejected();

        let mut total = a.snapshot();
        total.merge(&b.snapshot());

        assert_eq!(total.hits, 1);
        assert_eq!(total.misses, 1);
        assert_eq!(total.sets_dropped, 1);
        assert_eq!(total.sets_rejected, 1);
        assert_eq!(total.ratio(), 0.5);
    }
}
