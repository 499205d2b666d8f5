//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with per-category TTL expiry
//! and LRU eviction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::lru::least_recently_used;
use crate::cache::{CacheEntry, CacheStats, TtlPolicy};
use crate::clock::{Clock, SystemClock};
use crate::observer::{CacheObserver, RemovalReason, TracingObserver};

// == Cache Store ==
/// Main cache storage with LRU eviction and TTL support.
///
/// Not synchronized on its own; share it as a [`SharedCache`](crate::cache::SharedCache).
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Category -> TTL table
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
    /// Last access sequence number handed out
    seq: u64,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and TTL table.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the cache can hold (at least 1)
    /// * `policy` - Category -> TTL table
    pub fn new(max_entries: usize, policy: TtlPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            policy,
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
            seq: 0,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    // == Set ==
    /// Stores a value under `key`, overwriting any previous entry.
    ///
    /// The TTL comes from `category` via the policy table. If the key is new
    /// and the cache is at capacity, the least recently used entry is evicted
    /// first. Never fails.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: V,
        category: &str,
        metadata: Option<serde_json::Value>,
    ) {
        let key = key.into();
        let now = self.clock.now_ms();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            if let Some(victim) = least_recently_used(&self.entries) {
                self.entries.remove(&victim);
                self.stats.record_eviction();
                self.observer.on_remove(&victim, RemovalReason::Capacity);
            }
        }

        let ttl = self.policy.ttl_for(category);
        let mut entry = CacheEntry::new(value, category, ttl, now).with_metadata(metadata);
        entry.access_seq = self.next_seq();
        self.entries.insert(key, entry);

        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns None if the key is unknown or expired; an expired entry is
    /// removed on the way. A live hit updates the entry's access bookkeeping.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.record_miss(key);
                return None;
            }
        };

        if expired {
            self.remove_expired(key);
            self.record_miss(key);
            return None;
        }

        let seq = self.next_seq();
        let entry = self.entries.get_mut(key)?;
        entry.record_access(now, seq);
        let value = entry.value.clone();

        self.stats.record_hit();
        self.observer.on_hit(key);
        Some(value)
    }

    // == Has ==
    /// Returns whether a live entry exists for `key`.
    ///
    /// Leaves access bookkeeping and hit/miss counters alone, but still
    /// removes the entry if it turns out to be expired.
    pub fn has(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                self.remove_expired(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Peek ==
    /// Returns the live entry for `key` without touching any bookkeeping.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        let now = self.clock.now_ms();
        self.entries.get(key).filter(|entry| !entry.is_expired(now))
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Clear ==
    /// Removes every entry and resets all counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::new();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.observer.on_remove(key, RemovalReason::Expired);
        }

        let count = expired_keys.len();
        self.stats.record_expirations(count);
        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Returns the current number of entries, expired ones included until
    /// they are observed or cleaned up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn record_miss(&mut self, key: &str) {
        self.stats.record_miss();
        self.observer.on_miss(key);
    }

    fn remove_expired(&mut self, key: &str) {
        self.entries.remove(key);
        self.stats.record_expirations(1);
        self.stats.set_total_entries(self.entries.len());
        self.observer.on_remove(key, RemovalReason::Expired);
    }
}
