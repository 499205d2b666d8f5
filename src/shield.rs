//! Shield Module
//!
//! The intended composition of the three pieces:
//!
//! ```text
//! fetch(key)
//!     → cache hit?            return it
//!     → breaker.execute(
//!           retry.execute(op))
//!     → on success            cache under the caller's category
//!     → on fallback           cache under "fallback" (short TTL)
//! ```
//!
//! Concurrent misses on the same key each call the upstream; whichever `set`
//! lands last wins.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::cache::policy::FALLBACK;
use crate::cache::SharedCache;
use crate::error::ShieldError;
use crate::resilience::{CircuitBreaker, Classify, RetryEngine};

/// Where a fetched value came from.
enum Fetched<V> {
    Upstream(V),
    Fallback(V),
}

// == Shield ==
/// Cache + circuit breaker + retry in front of one upstream dependency.
#[derive(Debug, Clone)]
pub struct Shield<V> {
    cache: SharedCache<V>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryEngine,
}

impl<V: Clone> Shield<V> {
    pub fn new(cache: SharedCache<V>, breaker: Arc<CircuitBreaker>, retry: RetryEngine) -> Self {
        Self {
            cache,
            breaker,
            retry,
        }
    }

    pub fn cache(&self) -> &SharedCache<V> {
        &self.cache
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    // == Fetch ==
    /// Returns the cached value for `key`, or calls `operation` through the
    /// breaker and retry engine and caches its result under `category`.
    pub async fn fetch<E, F, Fut>(
        &self,
        key: &str,
        category: &str,
        context: &str,
        operation: F,
    ) -> Result<V, ShieldError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Classify,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(value);
        }

        let retry = &self.retry;
        let value = self
            .breaker
            .execute(move || retry.execute(operation, context))
            .await?;

        self.store(key, value.clone(), category).await;
        Ok(value)
    }

    // == Fetch Or Fallback ==
    /// Like [`fetch`](Self::fetch), but answers from `fallback` when the
    /// circuit is open. Fallback values are cached under the short-lived
    /// `fallback` category.
    pub async fn fetch_or_fallback<E, F, Fut, FB, FbFut>(
        &self,
        key: &str,
        category: &str,
        context: &str,
        operation: F,
        fallback: FB,
    ) -> Result<V, ShieldError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Classify,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = V>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(value);
        }

        let retry = &self.retry;
        let fetched = self
            .breaker
            .execute_with_fallback(
                move || async move { retry.execute(operation, context).await.map(Fetched::Upstream) },
                move || async move { Fetched::Fallback(fallback().await) },
            )
            .await?;

        let (value, category) = match fetched {
            Fetched::Upstream(value) => (value, category),
            Fetched::Fallback(value) => {
                debug!(key, breaker = self.breaker.name(), "serving fallback");
                (value, FALLBACK)
            }
        };

        self.store(key, value.clone(), category).await;
        Ok(value)
    }

    async fn lookup(&self, key: &str) -> Option<V> {
        self.cache.write().await.get(key)
    }

    async fn store(&self, key: &str, value: V, category: &str) {
        self.cache.write().await.set(key, value, category, None);
    }
}
