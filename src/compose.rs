//! Cross-Cache Composition Module
//!
//! Narrow capability traits for moving entries between stores, plus the
//! copy/merge operations built on them. The traits are deliberately
//! minimal so any compatible store, not just [`Cache`], can participate.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::cache::{Cache, Key, Value};

// == Capability Traits ==

/// A store that accepts entries in bulk.
#[async_trait]
pub trait BulkAdder<K: Key, V: Value>: Send + Sync {
    /// Inserts every pair, overwriting on key collision.
    async fn add_bulk(&self, entries: HashMap<K, V>);
}

/// A store that can snapshot all of its entries.
#[async_trait]
pub trait AllGetter<K: Key, V: Value>: Send + Sync {
    /// Returns a copy of every key/value pair.
    async fn get_all(&self) -> HashMap<K, V>;
}

/// A store that can atomically hand over all of its entries.
#[async_trait]
pub trait DrainingAllGetter<K: Key, V: Value>: AllGetter<K, V> {
    /// Returns every pair exactly once and leaves the store empty. No
    /// reader of the store may observe a partially-drained state.
    async fn get_all_and_remove(&self) -> HashMap<K, V>;
}

#[async_trait]
impl<K: Key, V: Value> BulkAdder<K, V> for Cache<K, V> {
    async fn add_bulk(&self, entries: HashMap<K, V>) {
        Cache::add_bulk(self, entries).await;
    }
}

#[async_trait]
impl<K: Key, V: Value> AllGetter<K, V> for Cache<K, V> {
    async fn get_all(&self) -> HashMap<K, V> {
        Cache::get_all(self).await
    }
}

#[async_trait]
impl<K: Key, V: Value> DrainingAllGetter<K, V> for Cache<K, V> {
    async fn get_all_and_remove(&self) -> HashMap<K, V> {
        Cache::get_all_and_remove(self).await
    }
}

// == Composition Operations ==

/// Copies `source`'s entries into `target`, overwriting on collision.
/// `source` is left untouched.
pub async fn merge<K, V, T, S>(target: &T, source: &S)
where
    K: Key,
    V: Value,
    T: BulkAdder<K, V> + ?Sized,
    S: AllGetter<K, V> + ?Sized,
{
    target.add_bulk(source.get_all().await).await;
}

/// Drains `source` into `target`; `source` ends empty.
///
/// The drain is atomic from `source`'s perspective, but the two stores
/// are locked independently: another writer may touch `target` between
/// the drain and the bulk insert.
pub async fn merge_and_reset<K, V, T, S>(target: &T, source: &S)
where
    K: Key,
    V: Value,
    T: BulkAdder<K, V> + ?Sized,
    S: DrainingAllGetter<K, V> + ?Sized,
{
    target.add_bulk(source.get_all_and_remove().await).await;
}

impl<K: Key, V: Value> Cache<K, V> {
    // == Copy ==
    /// Builds a new cache with this cache's requirements and a snapshot
    /// of its values. Timers are not copied: the new cache re-derives
    /// its own TTL behavior from the copied requirements.
    pub async fn copy(&self) -> Cache<K, V> {
        Cache::with_entries(Some(self.requirements()), self.get_all().await).await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Requirements;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[tokio::test]
    async fn test_merge_leaves_source_untouched() {
        let a = Cache::new(None);
        let b = Cache::new(None);
        a.add_bulk(HashMap::from([(1, "a1"), (2, "a2")])).await;
        b.add_bulk(HashMap::from([(2, "b2"), (3, "b3")])).await;

        merge(&a, &b).await;

        // Union of keys; b's values win on collision.
        assert_eq!(a.count().await, 3);
        assert_eq!(a.get(&2).await, Some("b2"));
        assert_eq!(b.count().await, 2);
    }

    #[tokio::test]
    async fn test_merge_and_reset_drains_source() {
        let target = Cache::new(None);
        let source = Cache::new(None);
        source.add_bulk(HashMap::from([(1, 1), (2, 2)])).await;

        merge_and_reset(&target, &source).await;

        assert_eq!(target.count().await, 2);
        assert_eq!(source.count().await, 0);
    }

    #[tokio::test]
    async fn test_copy_is_independent() {
        let original = Cache::new(Some(Requirements::new(Duration::from_secs(60))));
        original.add(1, "one".to_string()).await;

        let copied = original.copy().await;
        assert_eq!(copied.requirements(), original.requirements());
        assert_eq!(copied.get(&1).await, Some("one".to_string()));

        // Mutating the copy must not touch the original.
        copied.add(2, "two".to_string()).await;
        copied.remove(&1).await;
        assert_eq!(original.count().await, 1);
        assert_eq!(original.get(&1).await, Some("one".to_string()));
    }

    // A minimal external store: anything exposing the capability traits
    // can participate in merge, not just Cache.
    struct VecStore {
        pairs: AsyncMutex<Vec<(u32, String)>>,
    }

    #[async_trait]
    impl BulkAdder<u32, String> for VecStore {
        async fn add_bulk(&self, entries: HashMap<u32, String>) {
            let mut pairs = self.pairs.lock().await;
            for (key, value) in entries {
                pairs.retain(|(k, _)| *k != key);
                pairs.push((key, value));
            }
        }
    }

    #[tokio::test]
    async fn test_merge_into_external_store() {
        let target = VecStore {
            pairs: AsyncMutex::new(Vec::new()),
        };
        let source = Cache::new(None);
        source.add(7, "seven".to_string()).await;

        merge(&target, &source).await;

        let pairs = target.pairs.lock().await;
        assert_eq!(pairs.as_slice(), &[(7, "seven".to_string())]);
    }
}
