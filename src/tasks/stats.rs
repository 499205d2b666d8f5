//! Stats Reporter Task
//!
//! Periodically logs cache statistics and the state of every circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::SharedCache;
use crate::resilience::{CircuitBreaker, CircuitState};

/// Spawns a background task logging a stats snapshot every `interval`.
///
/// Reading stats never changes them, so the reporter has no effect on the
/// cache or the breakers beyond briefly holding the cache's read lock.
pub fn spawn_stats_reporter<V>(
    cache: SharedCache<V>,
    breakers: Vec<Arc<CircuitBreaker>>,
    interval: Duration,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            breakers = breakers.len(),
            "Starting stats reporter"
        );

        loop {
            tokio::time::sleep(interval).await;

            let stats = cache.read().await.stats();
            info!(
                entries = stats.total_entries,
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                expirations = stats.expirations,
                hit_rate = %format!("{:.1}%", stats.hit_rate() * 100.0),
                "cache stats"
            );

            for breaker in &breakers {
                let b = breaker.stats();
                if b.state == CircuitState::Closed {
                    info!(
                        breaker = %b.name,
                        state = %b.state,
                        calls = b.total_calls,
                        failures = b.total_failures,
                        "breaker stats"
                    );
                } else {
                    warn!(
                        breaker = %b.name,
                        state = %b.state,
                        consecutive_failures = b.consecutive_failures,
                        rejections = b.total_rejections,
                        fallbacks = b.total_fallbacks,
                        "breaker stats"
                    );
                }
            }
        }
    })
}
