//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a background task that periodically removes expired cache entries.
///
/// The task runs until aborted, sleeping for `interval` between sweeps. The
/// write lock is held only for the duration of one `cleanup()` call.
///
/// # Returns
/// A JoinHandle for the spawned task, to be aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = shared(CacheStore::<String>::new(1000, TtlPolicy::default()));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: SharedCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let (removed, remaining) = {
                let mut cache_guard = cache.write().await;
                let removed = cache_guard.cleanup();
                (removed, cache_guard.len())
            };

            if removed > 0 {
                info!(removed, remaining, "TTL cleanup: removed expired entries");
            } else {
                debug!(remaining, "TTL cleanup: no expired entries found");
            }
        }
    })
}
