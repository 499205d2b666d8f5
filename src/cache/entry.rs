//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use crate::clock::duration_ms;

// == Cache Entry ==
/// Represents a single cache entry with value, expiry and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// TTL bucket the entry was stored under
    pub category: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Lifetime chosen from the TTL policy at insertion
    pub ttl: Duration,
    /// Number of successful reads
    pub access_count: u64,
    /// Last successful read, or creation time (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Store-wide sequence number of the last touch, breaks timestamp ties
    pub(crate) access_seq: u64,
    /// Caller-supplied annotation, never interpreted by the cache
    pub metadata: Option<serde_json::Value>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry stamped at `now_ms`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `category` - TTL bucket name
    /// * `ttl` - Lifetime resolved from the category
    /// * `now_ms` - Current time in Unix milliseconds
    pub fn new(value: V, category: impl Into<String>, ttl: Duration, now_ms: u64) -> Self {
        Self {
            value,
            category: category.into(),
            created_at: now_ms,
            ttl,
            access_count: 0,
            last_accessed_at: now_ms,
            access_seq: 0,
            metadata: None,
        }
    }

    /// Attaches caller metadata.
    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    // == Expires At ==
    /// Expiration timestamp (Unix milliseconds).
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(duration_ms(self.ttl))
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry stays live through the instant `created_at + ttl` and is
    /// expired strictly after it.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at()
    }

    // == Time To Live ==
    /// Returns remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.expires_at().saturating_sub(now_ms))
    }

    // == Record Access ==
    /// Bumps the access bookkeeping after a successful read.
    pub(crate) fn record_access(&mut self, now_ms: u64, seq: u64) {
        self.access_count += 1;
        self.last_accessed_at = now_ms;
        self.access_seq = seq;
    }
}
