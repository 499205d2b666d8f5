//! Cache Module
//!
//! In-memory result cache with per-category TTL expiration and LRU eviction.

mod entry;
pub mod keys;
mod lru;
pub mod policy;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use entry::CacheEntry;
pub use keys::{build_key, fingerprint};
pub use policy::TtlPolicy;
pub use stats::CacheStats;
pub use store::CacheStore;

/// A cache shared between tasks. One lock per cache instance.
pub type SharedCache<V> = Arc<RwLock<CacheStore<V>>>;

/// Wraps a store for sharing.
pub fn shared<V>(store: CacheStore<V>) -> SharedCache<V> {
    Arc::new(RwLock::new(store))
}
