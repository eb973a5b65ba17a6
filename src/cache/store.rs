//! Cache Store Module
//!
//! The concurrent key/value engine: a single map behind a reader/writer
//! lock, with per-entry expiration timers re-entering the removal path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::cache::entry::{Entry, EntryHandle};
use crate::cache::key::{Key, Value};
use crate::cache::stats::{CacheStats, StatsCounters};
use crate::config::Requirements;

// == Cache ==
/// Thread-safe key/value cache with optional per-entry TTL expiration.
///
/// `Cache` is a cheap clonable handle; clones share the same underlying
/// store. All operations are linearizable with respect to the store's
/// single reader/writer lock: writers exclude everything, readers only
/// exclude writers.
///
/// Expiration timers are background tasks owned by their entry. A firing
/// timer re-enters the store through the same write lock as an explicit
/// `remove`, and carries a generation token so a timer armed for an
/// overwritten or re-added value can never delete its successor.
#[derive(Debug)]
pub struct Cache<K: Key, V: Value> {
    shared: Arc<Shared<K, V>>,
}

impl<K: Key, V: Value> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// State shared between cache handles and timer tasks.
#[derive(Debug)]
pub(crate) struct Shared<K: Key, V: Value> {
    /// TTL applied by `add`/`add_bulk`. Zero iff `ttl_active` is false.
    default_ttl: Duration,
    /// Resolved once at construction from the requirements.
    ttl_active: bool,
    /// Source of timer generation tokens.
    timer_generation: AtomicU64,
    stats: StatsCounters,
    inner: RwLock<Inner<K, V>>,
}

#[derive(Debug)]
struct Inner<K: Key, V: Value> {
    entries: HashMap<K, EntryHandle<K, V>>,
    /// Live entry count, maintained under the write lock alongside every
    /// map mutation. Always equals `entries.len()`.
    count: usize,
}

impl<K: Key, V: Value> Shared<K, V> {
    pub(crate) fn next_timer_generation(&self) -> u64 {
        self.timer_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Removal path entered by a fired expiration timer.
    ///
    /// The key is removed only if it is still present *and* its entry's
    /// armed timer carries the caller's generation token. Anything else
    /// means the timer is stale (key re-added, rearmed, or reset away)
    /// and the callback is a no-op.
    pub(crate) async fn remove_expired(&self, key: &K, generation: u64) {
        let mut inner = self.inner.write().await;

        let current = match inner.entries.get(key) {
            Some(entry) => entry.armed_generation(),
            None => None,
        };
        if current != Some(generation) {
            trace!(?key, generation, "stale expiration timer ignored");
            return;
        }

        if let Some(entry) = inner.entries.remove(key) {
            inner.count -= 1;
            entry.stop_timer();
            self.stats.record_expiration();
            debug!(?key, "entry expired");
        }
        debug_assert_eq!(inner.count, inner.entries.len());
    }
}

impl<K: Key, V: Value> Cache<K, V> {
    // == Constructors ==
    /// Creates an empty cache.
    ///
    /// `None` requirements disable automatic expiry, as does a zero
    /// default TTL.
    pub fn new(requirements: Option<Requirements>) -> Self {
        let requirements = requirements.unwrap_or_default();
        let ttl_active = requirements.ttl_active();

        Self {
            shared: Arc::new(Shared {
                default_ttl: requirements.default_ttl,
                ttl_active,
                timer_generation: AtomicU64::new(0),
                stats: StatsCounters::default(),
                inner: RwLock::new(Inner {
                    entries: HashMap::new(),
                    count: 0,
                }),
            }),
        }
    }

    /// Creates a cache pre-populated with the given entries.
    pub async fn with_entries(requirements: Option<Requirements>, initial: HashMap<K, V>) -> Self {
        let cache = Self::new(requirements);
        cache.add_bulk(initial).await;
        cache
    }

    /// The requirements this cache was constructed with.
    pub fn requirements(&self) -> Requirements {
        Requirements::new(self.shared.default_ttl)
    }

    // == Add ==
    /// Inserts or overwrites one entry and returns a handle to it.
    ///
    /// If TTL is active cache-wide the entry gets an expiration timer for
    /// the default duration. Overwriting stops the previous entry's timer
    /// and does not change the live count.
    pub async fn add(&self, key: K, value: V) -> EntryHandle<K, V> {
        let ttl = self.default_entry_ttl();
        let mut inner = self.shared.inner.write().await;
        self.insert_locked(&mut inner, key, value, ttl)
    }

    // == Add Bulk ==
    /// Inserts every pair in one critical section. An empty map is a
    /// no-op. Readers are blocked for the whole batch.
    pub async fn add_bulk(&self, entries: HashMap<K, V>) {
        if entries.is_empty() {
            return;
        }

        let ttl = self.default_entry_ttl();
        let mut inner = self.shared.inner.write().await;
        let batch = entries.len();
        for (key, value) in entries {
            self.insert_locked(&mut inner, key, value, ttl);
        }
        trace!(batch, "bulk add applied");
    }

    // == Add With Timeout ==
    /// Like `add`, but with an explicit TTL overriding the cache default
    /// for this one entry.
    pub async fn add_with_timeout(&self, key: K, value: V, ttl: Duration) -> EntryHandle<K, V> {
        let mut inner = self.shared.inner.write().await;
        self.insert_locked(&mut inner, key, value, Some(ttl))
    }

    // == Add Timer ==
    /// Arms a timer on an existing entry, or resets an armed one with the
    /// new duration. Silently ignored if the key does not exist.
    pub async fn add_timer(&self, key: &K, ttl: Duration) {
        let inner = self.shared.inner.read().await;
        if let Some(entry) = inner.entries.get(key) {
            entry.reset_timer_with(ttl);
        }
    }

    // == Remove ==
    /// Deletes one entry; removing an absent key is a no-op. Any armed
    /// timer on the removed entry is stopped.
    pub async fn remove(&self, key: &K) {
        let mut inner = self.shared.inner.write().await;
        Self::remove_locked(&mut inner, key);
    }

    // == Remove Bulk ==
    /// Deletes every listed key in one critical section. An empty slice
    /// is a no-op.
    pub async fn remove_bulk(&self, keys: &[K]) {
        if keys.is_empty() {
            return;
        }

        let mut inner = self.shared.inner.write().await;
        for key in keys {
            Self::remove_locked(&mut inner, key);
        }
    }

    // == Reset ==
    /// Atomically clears all entries.
    ///
    /// Timers on the cleared entries are stopped; a timer callback that
    /// already fired finds its key absent (or owned by a newer
    /// generation) and does nothing.
    pub async fn reset(&self) {
        let mut inner = self.shared.inner.write().await;
        let old = std::mem::take(&mut inner.entries);
        inner.count = 0;
        for entry in old.values() {
            entry.stop_timer();
        }
        debug!(cleared = old.len(), "cache reset");
    }

    // == Get ==
    /// Returns a copy of the value stored under `key`, or `None`.
    pub async fn get(&self, key: &K) -> Option<V> {
        let inner = self.shared.inner.read().await;
        match inner.entries.get(key) {
            Some(entry) => {
                self.shared.stats.record_hit();
                Some(entry.value())
            }
            None => {
                self.shared.stats.record_miss();
                None
            }
        }
    }

    // == Get Bulk ==
    /// Returns the key/value pairs for the listed keys that are present.
    pub async fn get_bulk(&self, keys: &[K]) -> HashMap<K, V> {
        let inner = self.shared.inner.read().await;
        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            match inner.entries.get(key) {
                Some(entry) => {
                    self.shared.stats.record_hit();
                    results.insert(key.clone(), entry.value());
                }
                None => self.shared.stats.record_miss(),
            }
        }
        results
    }

    // == Get All ==
    /// Returns a snapshot copy of every key/value pair.
    pub async fn get_all(&self) -> HashMap<K, V> {
        let inner = self.shared.inner.read().await;
        inner
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value()))
            .collect()
    }

    // == Exist ==
    /// True iff `key` is currently present.
    pub async fn exist(&self, key: &K) -> bool {
        let inner = self.shared.inner.read().await;
        inner.entries.contains_key(key)
    }

    // == Count ==
    /// Number of live entries.
    pub async fn count(&self) -> usize {
        let inner = self.shared.inner.read().await;
        inner.count
    }

    // == Get Random Samples ==
    /// Returns up to `n` entries in unspecified order. If `n` exceeds the
    /// live count, returns everything. No uniformity guarantee: this is
    /// an unordered sample, not a random-uniform one.
    pub async fn get_random_samples(&self, n: usize) -> HashMap<K, V> {
        let inner = self.shared.inner.read().await;
        inner
            .entries
            .iter()
            .take(n)
            .map(|(key, entry)| (key.clone(), entry.value()))
            .collect()
    }

    // == For Each ==
    /// Applies `f` to every live key/value pair while holding the read
    /// lock for the whole traversal.
    ///
    /// The callback must not re-enter this cache: any mutating call would
    /// deadlock on the store lock.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let inner = self.shared.inner.read().await;
        for (key, entry) in &inner.entries {
            f(key, entry.value_ref());
        }
    }

    // == Get And Remove ==
    /// Atomically removes `key` and returns its value, or `None` if it
    /// was absent. No other operation can observe the key present but the
    /// value gone, or vice versa.
    pub async fn get_and_remove(&self, key: &K) -> Option<V> {
        let mut inner = self.shared.inner.write().await;
        match Self::remove_locked(&mut inner, key) {
            Some(entry) => {
                self.shared.stats.record_hit();
                Some(entry.value())
            }
            None => {
                self.shared.stats.record_miss();
                None
            }
        }
    }

    /// Atomically removes `key` and returns the detached entry handle.
    /// The handle's timer is stopped; its value stays readable.
    pub async fn get_and_remove_entry(&self, key: &K) -> Option<EntryHandle<K, V>> {
        let mut inner = self.shared.inner.write().await;
        Self::remove_locked(&mut inner, key)
    }

    // == Get All And Remove ==
    /// Atomically drains the cache, returning every previously-present
    /// pair. Afterwards the cache is empty.
    pub async fn get_all_and_remove(&self) -> HashMap<K, V> {
        let mut inner = self.shared.inner.write().await;
        let drained = std::mem::take(&mut inner.entries);
        inner.count = 0;

        let mut results = HashMap::with_capacity(drained.len());
        for (key, entry) in drained {
            entry.stop_timer();
            results.insert(key, entry.value());
        }
        debug!(drained = results.len(), "cache drained");
        results
    }

    // == Stats ==
    /// Snapshot of the cache's performance counters.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.shared.inner.read().await;
        self.shared.stats.snapshot(inner.count)
    }

    /// TTL to arm on entries added without an explicit timeout.
    fn default_entry_ttl(&self) -> Option<Duration> {
        self.shared.ttl_active.then_some(self.shared.default_ttl)
    }

    /// Insert-or-overwrite under the write lock. Arms the new entry's
    /// timer before it becomes visible and stops the displaced entry's
    /// timer, so a stale countdown can never outlive its value.
    fn insert_locked(
        &self,
        inner: &mut Inner<K, V>,
        key: K,
        value: V,
        ttl: Option<Duration>,
    ) -> EntryHandle<K, V> {
        let entry = Arc::new(Entry::new(
            key.clone(),
            value,
            Arc::downgrade(&self.shared),
            ttl,
        ));
        if ttl.is_some() {
            entry.reset_timer();
        }

        match inner.entries.insert(key, Arc::clone(&entry)) {
            Some(previous) => previous.stop_timer(),
            None => inner.count += 1,
        }
        debug_assert_eq!(inner.count, inner.entries.len());
        entry
    }

    fn remove_locked(inner: &mut Inner<K, V>, key: &K) -> Option<EntryHandle<K, V>> {
        let entry = inner.entries.remove(key)?;
        inner.count -= 1;
        entry.stop_timer();
        debug_assert_eq!(inner.count, inner.entries.len());
        Some(entry)
    }
}

impl<K: Key, V: Value> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new(None)
    }
}
