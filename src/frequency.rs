//! Approximate Frequency Estimation for Admission Control
//!
//! A bounded mapping from key to a small counter with periodic decay,
//! backing the TinyLFU-style sampled admission policy: before displacing an
//! existing entry, the cache compares the candidate's estimated frequency
//! against the minimum frequency of a small sample of resident keys.
//!
//! This is deliberately not an accurate counter. Memory is bounded by
//! `capacity`, and every `capacity / 10` increments all counters are halved
//! so that long-lived keys cannot permanently dominate new arrivals.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Frequency estimator with bounded memory and periodic decay
pub struct Frequency {
    inner: RwLock<FrequencyInner>,
}

struct FrequencyInner {
    counters: HashMap<String, i64>,
    capacity: usize,
    /// Increments since the last decay pass.
    decay_ticks: usize,
}

impl Frequency {
    /// Create a new estimator tracking up to `capacity` keys.
    pub fn new(capacity: i64) -> Self {
        let capacity = if capacity <= 0 { 1_000_000 } else { capacity as usize };
        Self {
            inner: RwLock::new(FrequencyInner {
                counters: HashMap::new(),
                capacity,
                decay_ticks: 0,
            }),
        }
    }

    /// Increment the count for `key`, evicting a cold counter when full.
    pub fn increment(&self, key: &str) {
        let mut inner = self.inner.write();

        if let Some(count) = inner.counters.get_mut(key) {
            *count += 1;
        } else {
            if inner.counters.len() >= inner.capacity {
                inner.evict_one();
            }
            inner.counters.insert(key.to_string(), 1);
        }

        inner.decay_ticks += 1;
        let window = inner.capacity / 10;
        if window > 0 && inner.decay_ticks >= window {
            inner.decay();
        }
    }

    /// Estimated frequency of `key`, 0 if untracked.
    pub fn get(&self, key: &str) -> i64 {
        self.inner.read().counters.get(key).copied().unwrap_or(0)
    }

    /// Over the given candidate keys, return the key with the minimum
    /// estimated frequency and that frequency. Keys without a counter count
    /// as frequency 0. Returns `None` for an empty candidate set.
    pub fn sample_min<'a, I>(&self, candidates: I) -> Option<(String, i64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let inner = self.inner.read();
        let mut min: Option<(&str, i64)> = None;
        for key in candidates {
            let count = inner.counters.get(key).copied().unwrap_or(0);
            match min {
                Some((_, best)) if best <= count => {}
                _ => min = Some((key, count)),
            }
        }
        min.map(|(k, c)| (k.to_string(), c))
    }

    /// Number of tracked counters.
    pub fn len(&self) -> usize {
        self.inner.read().counters.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all counters and reset the decay clock.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.counters.clear();
        inner.decay_ticks = 0;
    }
}

impl FrequencyInner {
    /// Evict one counter to make room: prefer any counter at 1, else an
    /// arbitrary one.
    fn evict_one(&mut self) {
        let victim = self
            .counters
            .iter()
            .find(|(_, c)| **c == 1)
            .or_else(|| self.counters.iter().next())
            .map(|(k, _)| k.clone());
        if let Some(key) = victim {
            self.counters.remove(&key);
        }
    }

    /// Halve every counter to demote stale frequencies.
    fn decay(&mut self) {
        self.decay_ticks = 0;
        for count in self.counters.values_mut() {
            *count = (*count + 1) / 2;
        }
    }
}
