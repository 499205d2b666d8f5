//! TTL Policy Module
//!
//! Maps a content category to how long results in that category stay fresh.

use std::collections::HashMap;
use std::time::Duration;

// == Category Names ==
/// Rapidly changing content (trending lists, live counters).
pub const VOLATILE: &str = "volatile";
/// Content that rarely changes once generated.
pub const STABLE: &str = "stable";
/// Third-party metadata lookups. Also the tier for unknown categories.
pub const METADATA: &str = "metadata";
/// Results produced by a circuit breaker fallback.
pub const FALLBACK: &str = "fallback";
/// Cached failure markers.
pub const ERROR: &str = "error";

/// Every built-in category, in table order.
pub const CATEGORIES: [&str; 5] = [VOLATILE, STABLE, METADATA, FALLBACK, ERROR];

// == TTL Policy ==
/// Category -> TTL table.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    ttls: HashMap<String, Duration>,
    default_ttl: Duration,
}

impl TtlPolicy {
    /// Returns the built-in table.
    ///
    /// | category | TTL    |
    /// |----------|--------|
    /// | volatile | 5 min  |
    /// | stable   | 60 min |
    /// | metadata | 30 min |
    /// | fallback | 30 s   |
    /// | error    | 10 s   |
    pub fn new() -> Self {
        let metadata_ttl = Duration::from_secs(30 * 60);
        let ttls = HashMap::from([
            (VOLATILE.to_string(), Duration::from_secs(5 * 60)),
            (STABLE.to_string(), Duration::from_secs(60 * 60)),
            (METADATA.to_string(), metadata_ttl),
            (FALLBACK.to_string(), Duration::from_secs(30)),
            (ERROR.to_string(), Duration::from_secs(10)),
        ]);

        Self {
            ttls,
            default_ttl: metadata_ttl,
        }
    }

    /// Overrides (or adds) the TTL of one category.
    ///
    /// Overriding `metadata` also moves the default for unknown categories.
    pub fn with_ttl(mut self, category: impl Into<String>, ttl: Duration) -> Self {
        let category = category.into();
        if category == METADATA {
            self.default_ttl = ttl;
        }
        self.ttls.insert(category, ttl);
        self
    }

    /// Resolves the TTL for `category`, falling back to the metadata tier.
    pub fn ttl_for(&self, category: &str) -> Duration {
        self.ttls.get(category).copied().unwrap_or(self.default_ttl)
    }

    /// TTL used for categories missing from the table.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new()
    }
}
