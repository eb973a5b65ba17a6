//! Cache Entry Module
//!
//! A single stored value together with its optional expiration timer.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::cache::key::{Key, Value};
use crate::cache::store::Shared;

/// Shared handle to a cache entry.
///
/// Returned by `Cache::add` and friends; the cache's map and the caller
/// hold the same entry instance, so timer controls on the handle act on
/// the live entry.
pub type EntryHandle<K, V> = Arc<Entry<K, V>>;

// == Cache Entry ==
/// One stored value plus at most one outstanding expiration timer.
///
/// The value is immutable for the lifetime of the entry instance; an
/// overwrite through the cache creates a fresh entry. Timer state is
/// guarded by the entry's own lock, so timer controls never need the
/// store lock. The store lock, when held, is always taken before the
/// entry lock.
pub struct Entry<K: Key, V: Value> {
    key: K,
    value: V,
    /// Back-reference used by timer callbacks to re-enter the removal
    /// path. Weak: a pending timer must never keep a dead store alive,
    /// and upgrade failure makes the callback a no-op.
    store: Weak<Shared<K, V>>,
    timer: Mutex<TimerState>,
}

/// Timer bookkeeping for one entry.
#[derive(Debug, Default)]
struct TimerState {
    /// Last recorded TTL, used by `reset_timer`. `None` means no timer
    /// machinery was ever enabled for this entry.
    ttl: Option<Duration>,
    /// Currently armed countdown, if any.
    armed: Option<ArmedTimer>,
}

/// An armed countdown: the spawned sleep task plus its identity.
#[derive(Debug)]
struct ArmedTimer {
    task: JoinHandle<()>,
    deadline: Instant,
    /// Identity token checked by the expiry callback before it removes
    /// anything. A rearm or overwrite issues a new generation, so a
    /// stale timer can never delete a newer value for the same key.
    generation: u64,
}

impl Drop for ArmedTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<K: Key, V: Value> Entry<K, V> {
    pub(crate) fn new(key: K, value: V, store: Weak<Shared<K, V>>, ttl: Option<Duration>) -> Self {
        Self {
            key,
            value,
            store,
            timer: Mutex::new(TimerState { ttl, armed: None }),
        }
    }

    // == Value ==
    /// Returns a copy of the stored value.
    pub fn value(&self) -> V {
        self.value.clone()
    }

    pub(crate) fn value_ref(&self) -> &V {
        &self.value
    }

    /// Returns the key this entry is stored under.
    pub fn key(&self) -> &K {
        &self.key
    }

    // == Timer Exist ==
    /// True iff an expiration timer is currently armed.
    ///
    /// Best-effort near expiration: a timer that has fired but whose
    /// removal has not yet gone through the store may still report `true`.
    pub fn timer_exist(&self) -> bool {
        self.lock_timer().armed.is_some()
    }

    // == Set Timer ==
    /// Records a new TTL for future resets without touching a running
    /// countdown. Lets a caller batch-configure durations and commit
    /// them with a single `reset_timer`.
    pub fn set_timer(&self, ttl: Duration) {
        self.lock_timer().ttl = Some(ttl);
    }

    // == Reset Timer ==
    /// Restarts the countdown from now using the last recorded TTL.
    ///
    /// Silently ignored if no timer machinery exists for this entry,
    /// i.e. TTL was never enabled for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn reset_timer(&self) {
        let mut state = self.lock_timer();
        let Some(ttl) = state.ttl else {
            return;
        };
        self.arm_locked(&mut state, ttl);
    }

    /// Restarts the countdown from now with a fresh TTL, which also
    /// becomes the recorded duration for later resets.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn reset_timer_with(&self, ttl: Duration) {
        let mut state = self.lock_timer();
        state.ttl = Some(ttl);
        self.arm_locked(&mut state, ttl);
    }

    // == Stop Timer ==
    /// Disarms the timer without removing the entry from the cache.
    /// No-op if no timer is armed.
    pub fn stop_timer(&self) {
        // ArmedTimer aborts its task on drop.
        self.lock_timer().armed.take();
    }

    // == Time Left ==
    /// Remaining time until the armed deadline, or `None` when no timer
    /// is armed.
    pub fn time_left(&self) -> Option<Duration> {
        self.lock_timer()
            .armed
            .as_ref()
            .map(|armed| armed.deadline.saturating_duration_since(Instant::now()))
    }

    /// Generation of the currently armed timer, if any. The expiry
    /// callback compares this against its own token before removing.
    pub(crate) fn armed_generation(&self) -> Option<u64> {
        self.lock_timer().armed.as_ref().map(|armed| armed.generation)
    }

    /// Arms a fresh countdown, replacing (and cancelling) any previous
    /// one. The spawned task captures only the weak store reference, the
    /// key and the generation token.
    fn arm_locked(&self, state: &mut TimerState, ttl: Duration) {
        let Some(store) = self.store.upgrade() else {
            return;
        };

        let generation = store.next_timer_generation();
        let deadline = Instant::now() + ttl;
        let key = self.key.clone();
        let weak = Weak::clone(&self.store);

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(store) = weak.upgrade() {
                store.remove_expired(&key, generation).await;
            }
        });

        trace!(key = ?self.key, ?ttl, generation, "expiration timer armed");

        // Dropping the previous ArmedTimer aborts its task.
        state.armed = Some(ArmedTimer {
            task,
            deadline,
            generation,
        });
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.timer.lock().expect("entry timer lock poisoned")
    }
}

impl<K: Key, V: Value> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("timer_armed", &self.timer_exist())
            .finish_non_exhaustive()
    }
}
