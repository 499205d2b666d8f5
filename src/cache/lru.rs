//! LRU Selection Module
//!
//! Picks the eviction victim by scanning every entry. O(n), run once per
//! insert at capacity.

use std::collections::HashMap;

use crate::cache::CacheEntry;

// == Least Recently Used ==
/// Returns the key with the smallest `(last_accessed_at, access_seq)`.
///
/// The sequence number is unique per touch, so the choice is deterministic
/// even when several entries were last read in the same millisecond.
/// Returns None if `entries` is empty.
pub fn least_recently_used<V>(entries: &HashMap<String, CacheEntry<V>>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, entry)| (entry.last_accessed_at, entry.access_seq))
        .map(|(key, _)| key.clone())
}
