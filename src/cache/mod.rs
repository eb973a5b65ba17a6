//! Cache Module
//!
//! The in-memory cache engine: entries with optional expiration timers,
//! the locked store, and its performance counters.

mod entry;
mod key;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{Entry, EntryHandle};
pub use key::{Key, Value};
pub use stats::CacheStats;
pub use store::Cache;
