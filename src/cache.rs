//! Cost-Bounded Cache Engine (Single Shard)
//!
//! Wraps the LRU store with TTL expiration, an asynchronous admission queue,
//! TinyLFU-style sampled admission, eviction callbacks, and periodic
//! background sweeps.
//!
//! # Write Path
//!
//! `set` validates cost and enqueues onto a bounded admission queue without
//! blocking — when the queue is full the set is dropped and counted, never
//! stalled. A dedicated worker thread drains the queue: it bumps the key's
//! frequency, applies sampled admission when the store is near capacity,
//! evicts from the LRU tail until the incoming cost fits, then inserts or
//! updates. A `get` immediately after a `set` may therefore miss; callers
//! needing read-after-write call [`Cache::wait`] first.
//!
//! # Callbacks
//!
//! `on_evict`, `on_reject`, and `on_exit` run on the worker thread. They must
//! not block and must not re-enter the cache on the same shard.
//!
//! # Example
//!
//! ```
//! use hoard::cache::{Cache, CacheConfig};
//!
//! let cache: Cache<String> = Cache::new(CacheConfig::default());
//! cache.set("greeting", "hello".to_string(), 1);
//! cache.wait();
//! assert_eq!(cache.get("greeting").as_deref(), Some("hello"));
//! cache.close();
//! ```

use crate::frequency::Frequency;
use crate::lru::LruStore;
use crate::metrics::Metrics;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default frequency-counter capacity (10M keys)
pub const DEFAULT_NUM_COUNTERS: i64 = 10_000_000;
/// Default cost budget (1 GiB)
pub const DEFAULT_MAX_COST: i64 = 1 << 30;
/// Default admission queue depth multiplier (queue size = 10x this)
pub const DEFAULT_BUFFER_ITEMS: usize = 64;
/// Default GC trigger threshold, in percent of the cost budget
pub const DEFAULT_GC_MEM_THRESHOLD: u32 = 80;

/// Number of resident keys sampled by the admission policy
const ADMISSION_SAMPLE: usize = 5;

/// Callback invoked with `(key, value, cost)` on eviction or rejection
pub type EvictionCallback<V> = Arc<dyn Fn(&str, &V, i64) + Send + Sync>;
/// Callback invoked with a payload leaving the cache for any reason
pub type ExitCallback<V> = Arc<dyn Fn(&V) + Send + Sync>;

/// Cache engine configuration
pub struct CacheConfig<V> {
    /// Number of keys tracked by the frequency estimator
    /// (recommend: expected keys x 10)
    pub num_counters: i64,
    /// Maximum total cost of the store
    pub max_cost: i64,
    /// Admission queue depth multiplier; queue size is 10x this value
    pub buffer_items: usize,
    /// Retained for configuration compatibility; counters are always kept
    pub metrics: bool,
    /// Default TTL; enables the background expiration sweeper
    pub ttl: Option<Duration>,
    /// Invoked when an entry is evicted to reclaim cost
    pub on_evict: Option<EvictionCallback<V>>,
    /// Invoked when a set is rejected for exceeding the cost budget
    pub on_reject: Option<EvictionCallback<V>>,
    /// Invoked whenever a payload leaves the cache (evict, reject, replace, del)
    pub on_exit: Option<ExitCallback<V>>,
    /// Interval of the background GC pass; `None` disables it
    pub gc_interval: Option<Duration>,
    /// Cost percentage above which a GC pass starts reclaiming
    pub gc_mem_threshold: u32,
}

impl<V> Default for CacheConfig<V> {
    fn default() -> Self {
        Self {
            num_counters: DEFAULT_NUM_COUNTERS,
            max_cost: DEFAULT_MAX_COST,
            buffer_items: DEFAULT_BUFFER_ITEMS,
            metrics: false,
            ttl: None,
            on_evict: None,
            on_reject: None,
            on_exit: None,
            gc_interval: None,
            gc_mem_threshold: DEFAULT_GC_MEM_THRESHOLD,
        }
    }
}

impl<V> Clone for CacheConfig<V> {
    fn clone(&self) -> Self {
        Self {
            num_counters: self.num_counters,
            max_cost: self.max_cost,
            buffer_items: self.buffer_items,
            metrics: self.metrics,
            ttl: self.ttl,
            on_evict: self.on_evict.clone(),
            on_reject: self.on_reject.clone(),
            on_exit: self.on_exit.clone(),
            gc_interval: self.gc_interval,
            gc_mem_threshold: self.gc_mem_threshold,
        }
    }
}

impl<V> CacheConfig<V> {
    /// Set the frequency-counter capacity
    #[must_use]
    pub fn with_num_counters(mut self, num_counters: i64) -> Self {
        self.num_counters = num_counters;
        self
    }

    /// Set the cost budget
    #[must_use]
    pub fn with_max_cost(mut self, max_cost: i64) -> Self {
        self.max_cost = max_cost;
        self
    }

    /// Set the admission queue depth multiplier
    #[must_use]
    pub fn with_buffer_items(mut self, buffer_items: usize) -> Self {
        self.buffer_items = buffer_items;
        self
    }

    /// Enable or disable the metrics flag
    #[must_use]
    pub fn with_metrics(mut self, metrics: bool) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the default TTL and enable the expiration sweeper
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the eviction callback
    #[must_use]
    pub fn with_on_evict(mut self, callback: EvictionCallback<V>) -> Self {
        self.on_evict = Some(callback);
        self
    }

    /// Set the rejection callback
    #[must_use]
    pub fn with_on_reject(mut self, callback: EvictionCallback<V>) -> Self {
        self.on_reject = Some(callback);
        self
    }

    /// Set the exit callback
    #[must_use]
    pub fn with_on_exit(mut self, callback: ExitCallback<V>) -> Self {
        self.on_exit = Some(callback);
        self
    }

    /// Set the GC interval and enable the GC runner
    #[must_use]
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = Some(interval);
        self
    }

    /// Set the GC trigger threshold (percent of the cost budget)
    #[must_use]
    pub fn with_gc_mem_threshold(mut self, percent: u32) -> Self {
        self.gc_mem_threshold = percent;
        self
    }
}

/// Serializable memory statistics for one engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemStats {
    pub len: usize,
    pub cost: i64,
    pub max_cost: i64,
    pub cost_percent: i64,
}

struct SetItem<V> {
    key: String,
    value: V,
    cost: i64,
    expires_at: Option<Instant>,
}

enum Task<V> {
    Set(SetItem<V>),
    /// Drain barrier: everything enqueued before it has been processed when
    /// the acknowledgment fires.
    Drain(mpsc::SyncSender<()>),
    Shutdown,
}

struct Inner<V> {
    store: RwLock<LruStore<V>>,
    freq: Frequency,
    metrics: Metrics,
    max_cost: i64,
    gc_mem_threshold: u32,
    on_evict: Option<EvictionCallback<V>>,
    on_reject: Option<EvictionCallback<V>>,
    on_exit: Option<ExitCallback<V>>,
    closed: AtomicBool,
}

/// One cache shard: LRU store + frequency estimator + admission worker
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
    queue: mpsc::SyncSender<Task<V>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    tickers: Mutex<Vec<(mpsc::Sender<()>, JoinHandle<()>)>>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    /// Create a new engine and start its background workers.
    pub fn new(config: CacheConfig<V>) -> Self {
        let num_counters = if config.num_counters <= 0 {
            DEFAULT_NUM_COUNTERS
        } else {
            config.num_counters
        };
        let max_cost = if config.max_cost <= 0 {
            DEFAULT_MAX_COST
        } else {
            config.max_cost
        };
        let buffer_items = if config.buffer_items == 0 {
            DEFAULT_BUFFER_ITEMS
        } else {
            config.buffer_items
        };

        let inner = Arc::new(Inner {
            store: RwLock::new(LruStore::new(max_cost)),
            freq: Frequency::new(num_counters),
            metrics: Metrics::new(),
            max_cost,
            gc_mem_threshold: config.gc_mem_threshold,
            on_evict: config.on_evict,
            on_reject: config.on_reject,
            on_exit: config.on_exit,
            closed: AtomicBool::new(false),
        });

        let (queue, rx) = mpsc::sync_channel(buffer_items * 10);
        let worker = {
            let inner = Arc::clone(&inner);
            std::thread::spawn(move || run_worker(inner, rx))
        };

        let mut tickers = Vec::new();
        if let Some(ttl) = config.ttl {
            let interval = (ttl / 2).max(Duration::from_millis(1));
            tickers.push(start_ticker(Arc::clone(&inner), interval, |inner| {
                inner.sweep_expired();
            }));
        }
        if let Some(interval) = config.gc_interval {
            if config.gc_mem_threshold > 0 {
                tickers.push(start_ticker(Arc::clone(&inner), interval, |inner| {
                    inner.do_gc();
                }));
            }
        }

        Self {
            inner,
            queue,
            worker: Mutex::new(Some(worker)),
            tickers: Mutex::new(tickers),
        }
    }

    /// Enqueue a set. Returns false when the engine is closed, the cost
    /// exceeds the budget (rejected), or the admission queue is full
    /// (dropped).
    pub fn set(&self, key: impl Into<String>, value: V, cost: i64) -> bool {
        self.set_internal(key.into(), value, cost, None)
    }

    /// Enqueue a set whose entry expires after `ttl`. A zero `ttl` means no
    /// expiration.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, cost: i64, ttl: Duration) -> bool {
        let expires_at = if ttl > Duration::ZERO {
            Some(Instant::now() + ttl)
        } else {
            None
        };
        self.set_internal(key.into(), value, cost, expires_at)
    }

    fn set_internal(&self, key: String, value: V, cost: i64, expires_at: Option<Instant>) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }

        let cost = cost.max(1);
        if cost > self.inner.max_cost {
            self.inner.metrics.record_set_rejected();
            if let Some(cb) = &self.inner.on_reject {
                cb(&key, &value, cost);
            }
            if let Some(cb) = &self.inner.on_exit {
                cb(&value);
            }
            return false;
        }

        match self.queue.try_send(Task::Set(SetItem { key, value, cost, expires_at })) {
            Ok(()) => true,
            Err(_) => {
                self.inner.metrics.record_set_dropped();
                false
            }
        }
    }

    /// Look up `key`, refreshing its recency and frequency on a hit.
    pub fn get(&self, key: &str) -> Option<V> {
        if self.inner.closed.load(Ordering::Acquire) {
            return None;
        }
        let value = self
            .inner
            .store
            .write()
            .get_and_update(key)
            .map(|entry| entry.value.clone());
        match value {
            Some(value) => {
                self.inner.freq.increment(key);
                self.inner.metrics.record_hit();
                Some(value)
            }
            None => {
                self.inner.metrics.record_miss();
                None
            }
        }
    }

    /// Like [`get`](Self::get), additionally returning the remaining TTL
    /// (zero when the entry has no expiration).
    pub fn get_with_ttl(&self, key: &str) -> Option<(V, Duration)> {
        if self.inner.closed.load(Ordering::Acquire) {
            return None;
        }
        let now = Instant::now();
        let found = self
            .inner
            .store
            .write()
            .get_and_update(key)
            .map(|entry| (entry.value.clone(), entry.remaining_ttl(now)));
        match found {
            Some(hit) => {
                self.inner.freq.increment(key);
                self.inner.metrics.record_hit();
                Some(hit)
            }
            None => {
                self.inner.metrics.record_miss();
                None
            }
        }
    }

    /// Remaining TTL of `key` (zero when the entry never expires).
    pub fn get_ttl(&self, key: &str) -> Option<Duration> {
        self.get_with_ttl(key).map(|(_, ttl)| ttl)
    }

    /// Check presence without refreshing recency.
    pub fn exists(&self, key: &str) -> bool {
        self.inner.store.read().get(key).is_some()
    }

    /// Compare-and-swap: issue `set(new)` only when the current payload
    /// equals `old`. Equality is the payload type's `PartialEq`.
    pub fn cas(&self, key: &str, old: &V, new: V, cost: i64) -> bool
    where
        V: PartialEq,
    {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }
        let matches = self
            .inner
            .store
            .read()
            .get(key)
            .map(|entry| entry.value == *old)
            .unwrap_or(false);
        if !matches {
            return false;
        }
        self.set(key, new, cost)
    }

    /// Remove `key` immediately, firing `on_exit` for the payload.
    pub fn del(&self, key: &str) {
        let removed = self.inner.store.write().remove(key);
        if let Some(entry) = removed {
            if let Some(cb) = &self.inner.on_exit {
                cb(&entry.value);
            }
        }
    }

    /// Look up multiple keys; only found keys appear in the result.
    pub fn mget<I, S>(&self, keys: I) -> HashMap<String, V>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = HashMap::new();
        for key in keys {
            if let Some(value) = self.get(key.as_ref()) {
                result.insert(key.as_ref().to_string(), value);
            }
        }
        result
    }

    /// Set multiple values at `default_cost` each; returns the number of
    /// accepted sets.
    pub fn mset(&self, items: HashMap<String, V>, default_cost: i64) -> usize {
        let cost = default_cost.max(1);
        let mut accepted = 0;
        for (key, value) in items {
            if self.set(key, value, cost) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Set multiple values with individual costs; returns the number of
    /// accepted sets.
    pub fn mset_with_costs(&self, items: HashMap<String, (V, i64)>) -> usize {
        let mut accepted = 0;
        for (key, (value, cost)) in items {
            if self.set(key, value, cost.max(1)) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Block until every set enqueued before this call has been processed.
    pub fn wait(&self) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        if self.queue.send(Task::Drain(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Remove every entry and reset the frequency estimator.
    pub fn clear(&self) {
        self.inner.store.write().clear();
        self.inner.freq.reset();
    }

    /// Close the engine: stop admissions, drain the queue, and join all
    /// background threads. Idempotent.
    pub fn close(&self) {
        self.shutdown();
    }

    /// Whether the engine has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.store.read().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current total cost of resident entries.
    pub fn cost(&self) -> i64 {
        self.inner.store.read().cost()
    }

    /// The configured cost budget.
    pub fn max_cost(&self) -> i64 {
        self.inner.max_cost
    }

    /// The engine's counters.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Memory statistics snapshot.
    pub fn mem_stats(&self) -> MemStats {
        let (len, cost) = {
            let store = self.inner.store.read();
            (store.len(), store.cost())
        };
        MemStats {
            len,
            cost,
            max_cost: self.inner.max_cost,
            cost_percent: cost * 100 / self.inner.max_cost,
        }
    }

    /// Run one GC pass now (used by the sharded cache's central ticker).
    pub(crate) fn do_gc(&self) {
        self.inner.do_gc();
    }
}

impl<V> Cache<V> {
    /// Flip the closed flag, signal every background thread, and join them.
    fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.queue.send(Task::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        for (stop, handle) in self.tickers.lock().drain(..) {
            drop(stop);
            let _ = handle.join();
        }
    }
}

impl<V> std::fmt::Display for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.inner.store.read();
        write!(
            f,
            "Cache{{len={}, cost={}, {}}}",
            store.len(),
            store.cost(),
            self.inner.metrics
        )
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<V: Clone + Send + Sync + 'static>(inner: Arc<Inner<V>>, rx: mpsc::Receiver<Task<V>>) {
    debug!("admission worker started");
    loop {
        match rx.recv() {
            Ok(Task::Set(item)) => inner.process_one(item),
            Ok(Task::Drain(ack)) => {
                let _ = ack.send(());
            }
            Ok(Task::Shutdown) | Err(_) => {
                // Drain whatever is still queued, then exit.
                while let Ok(task) = rx.try_recv() {
                    match task {
                        Task::Set(item) => inner.process_one(item),
                        Task::Drain(ack) => {
                            let _ = ack.send(());
                        }
                        Task::Shutdown => {}
                    }
                }
                break;
            }
        }
    }
    debug!("admission worker stopped");
}

fn start_ticker<V: Clone + Send + Sync + 'static>(
    inner: Arc<Inner<V>>,
    interval: Duration,
    tick: impl Fn(&Inner<V>) + Send + 'static,
) -> (mpsc::Sender<()>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = std::thread::spawn(move || loop {
        match rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if inner.closed.load(Ordering::Acquire) {
                    break;
                }
                tick(&inner);
            }
            // Stop sender dropped or signalled: shut down.
            _ => break,
        }
    });
    (tx, handle)
}

impl<V: Clone + Send + Sync + 'static> Inner<V> {
    fn process_one(&self, item: SetItem<V>) {
        let SetItem { key, value, cost, expires_at } = item;

        self.freq.increment(&key);

        // Sampled admission: near capacity, displace the coldest of a small
        // sample when the incoming key is hotter.
        let (current_cost, len) = {
            let store = self.store.read();
            (store.cost(), store.len())
        };
        if current_cost > self.max_cost * 7 / 10 && len > 0 {
            let incoming = self.freq.get(&key);
            let sample = self.store.read().sample_keys(ADMISSION_SAMPLE);
            if let Some((victim, min_freq)) =
                self.freq.sample_min(sample.iter().map(String::as_str))
            {
                if incoming > min_freq {
                    self.store.write().remove(&victim);
                }
            }
        }

        // Evict from the LRU tail until the incoming cost fits, then insert
        // or update. Callbacks fire after the lock is released.
        let mut evicted = Vec::new();
        let replaced = {
            let mut store = self.store.write();
            while store.cost() + cost > self.max_cost && !store.is_empty() {
                match store.evict_oldest() {
                    Some(victim) => evicted.push(victim),
                    None => break,
                }
            }
            let mut outcome = store.add(key, value, cost, expires_at);
            evicted.append(&mut outcome.evicted);
            outcome.replaced
        };

        for (victim_key, entry) in &evicted {
            self.metrics.record_eviction(entry.cost);
            if let Some(cb) = &self.on_evict {
                cb(victim_key, &entry.value, entry.cost);
            }
            if let Some(cb) = &self.on_exit {
                cb(&entry.value);
            }
        }

        match replaced {
            Some(old) => {
                self.metrics.record_cost_added(cost);
                if let Some(cb) = &self.on_exit {
                    cb(&old);
                }
            }
            None => {
                self.metrics.record_key_added();
                self.metrics.record_cost_added(cost);
            }
        }
    }

    fn evict_one(&self) -> bool {
        let victim = self.store.write().evict_oldest();
        match victim {
            Some((key, entry)) => {
                self.metrics.record_eviction(entry.cost);
                if let Some(cb) = &self.on_evict {
                    cb(&key, &entry.value, entry.cost);
                }
                if let Some(cb) = &self.on_exit {
                    cb(&entry.value);
                }
                true
            }
            None => false,
        }
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        let snapshot = self.store.read().items();
        for info in snapshot {
            if !matches!(info.expires_at, Some(deadline) if now > deadline) {
                continue;
            }
            // Re-check under the write lock; the entry may have been
            // refreshed or removed since the snapshot.
            let removed = self.store.write().remove_if_expired(&info.key, now);
            if let Some(entry) = removed {
                self.metrics.record_eviction(entry.cost);
                if let Some(cb) = &self.on_evict {
                    cb(&info.key, &entry.value, entry.cost);
                }
                if let Some(cb) = &self.on_exit {
                    cb(&entry.value);
                }
            }
        }
    }

    fn do_gc(&self) {
        let cost = self.store.read().cost();
        let percent = cost * 100 / self.max_cost;
        if percent <= i64::from(self.gc_mem_threshold) {
            return;
        }
        debug!(cost, percent, "gc pass reclaiming");
        self.sweep_expired();
        loop {
            let (cost, len) = {
                let store = self.store.read();
                (store.cost(), store.len())
            };
            if cost <= self.max_cost || len == 0 {
                break;
            }
            let batch = (len / 10).max(1);
            for _ in 0..batch {
                if !self.evict_one() {
                    return;
                }
            }
        }
    }
}
