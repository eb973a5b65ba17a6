//! Memocache - an embeddable, thread-safe key/value cache
//!
//! Provides a generic in-process map with bulk mutation, read and merge
//! operations, and optional per-entry time-to-live expiration.
//!
//! # Overview
//!
//! A [`Cache`] is constructed from optional [`Requirements`]; a non-zero
//! default TTL arms an expiration timer on every added entry. Timers are
//! background Tokio tasks that re-enter the cache's own removal path, so
//! expiry is safe to race against any concurrent operation. Cross-cache
//! composition ([`merge`], [`merge_and_reset`], [`Cache::copy`]) goes
//! through narrow capability traits that any compatible store can
//! implement.
//!
//! ```
//! use std::time::Duration;
//! use memocache::{Cache, Requirements};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache = Cache::new(Some(Requirements::new(Duration::from_secs(300))));
//! cache.add(1, "one".to_string()).await;
//! assert_eq!(cache.get(&1).await, Some("one".to_string()));
//! # }
//! ```

pub mod cache;
pub mod compose;
pub mod config;

pub use cache::{Cache, CacheStats, Entry, EntryHandle, Key, Value};
pub use compose::{merge, merge_and_reset, AllGetter, BulkAdder, DrainingAllGetter};
pub use config::Requirements;
