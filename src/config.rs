//! Configuration Module
//!
//! Cache-wide requirements, resolved once when a cache is constructed.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cache-wide configuration.
///
/// The only tunable is the default time-to-live applied to every entry
/// added without an explicit timeout. A zero duration disables automatic
/// expiry; so does constructing a cache with `None` requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    /// Default TTL for entries added without an explicit timeout.
    /// Zero means entries never expire on their own.
    pub default_ttl: Duration,
}

impl Requirements {
    /// Creates requirements with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self { default_ttl }
    }

    /// Creates requirements from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMOCACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds
    ///   (default: 0, automatic expiry disabled)
    pub fn from_env() -> Self {
        let millis = env::var("MEMOCACHE_DEFAULT_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            default_ttl: Duration::from_millis(millis),
        }
    }

    /// True iff entries added to a cache with these requirements get an
    /// expiration timer by default. Derived from `default_ttl`, never set
    /// directly.
    pub fn ttl_active(&self) -> bool {
        !self.default_ttl.is_zero()
    }
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            default_ttl: Duration::ZERO,
        }
    }
}
