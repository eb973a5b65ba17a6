//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify the cache's bookkeeping invariants against a
//! plain in-memory model. Async operations are driven to completion with
//! `tokio_test::block_on`.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::cache::Cache;

// == Strategies ==
/// Small key space so operation sequences actually collide.
fn key_strategy() -> impl Strategy<Value = i64> {
    0..8i64
}

/// A sequence of cache mutations for model-based testing.
#[derive(Debug, Clone)]
enum CacheOp {
    Add { key: i64, value: i64 },
    Remove { key: i64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), any::<i64>()).prop_map(|(key, value)| CacheOp::Add { key, value }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of adds and removes, the live count equals the
    // number of distinct keys added and not since removed, and the
    // contents match a plain map driven by the same operations.
    #[test]
    fn prop_count_and_contents_match_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut model: HashMap<i64, i64> = HashMap::new();
        let (count, contents) = tokio_test::block_on(async {
            let cache = Cache::new(None);
            for op in &ops {
                match *op {
                    CacheOp::Add { key, value } => {
                        cache.add(key, value).await;
                        model.insert(key, value);
                    }
                    CacheOp::Remove { key } => {
                        cache.remove(&key).await;
                        model.remove(&key);
                    }
                }
            }
            (cache.count().await, cache.get_all().await)
        });

        prop_assert_eq!(count, model.len(), "Live count drifted from model");
        prop_assert_eq!(contents, model, "Contents drifted from model");
    }

    // Removing a key twice leaves the cache in the same state as
    // removing it once.
    #[test]
    fn prop_remove_is_idempotent(entries in prop::collection::hash_map(key_strategy(), any::<i64>(), 0..8),
                                 key in key_strategy()) {
        let (after_once, after_twice) = tokio_test::block_on(async {
            let cache = Cache::with_entries(None, entries).await;

            cache.remove(&key).await;
            let after_once = cache.get_all().await;

            cache.remove(&key).await;
            let after_twice = cache.get_all().await;

            (after_once, after_twice)
        });

        prop_assert_eq!(after_once, after_twice, "Second remove changed state");
    }

    // get_all immediately after add_bulk on an empty cache returns the
    // input mapping.
    #[test]
    fn prop_bulk_round_trip(entries in prop::collection::hash_map(any::<i64>(), any::<i64>(), 0..32)) {
        let contents = tokio_test::block_on(async {
            let cache = Cache::new(None);
            cache.add_bulk(entries.clone()).await;
            cache.get_all().await
        });

        prop_assert_eq!(contents, entries, "Round-trip mapping mismatch");
    }

    // get_all_and_remove hands over every pair exactly once and leaves
    // the cache empty.
    #[test]
    fn prop_drain_is_exact(entries in prop::collection::hash_map(any::<i64>(), any::<i64>(), 0..32)) {
        let (drained, count) = tokio_test::block_on(async {
            let cache = Cache::with_entries(None, entries.clone()).await;
            let drained = cache.get_all_and_remove().await;
            (drained, cache.count().await)
        });

        prop_assert_eq!(drained, entries, "Drained pairs mismatch");
        prop_assert_eq!(count, 0, "Cache not empty after drain");
    }

    // The last add for a key wins; earlier values are unobservable.
    #[test]
    fn prop_overwrite_keeps_last_value(key in key_strategy(),
                                       values in prop::collection::vec(any::<i64>(), 1..10)) {
        let (stored, count) = tokio_test::block_on(async {
            let cache = Cache::new(None);
            for value in &values {
                cache.add(key, *value).await;
            }
            (cache.get(&key).await, cache.count().await)
        });

        prop_assert_eq!(stored, values.last().copied(), "Overwrite lost the last value");
        prop_assert_eq!(count, 1, "Overwrites must not inflate the count");
    }
}
