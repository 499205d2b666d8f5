//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::cache::{shared, CacheStore, SharedCache};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    BreakerResetResponse, CleanupResponse, ClearResponse, DeleteResponse, HealthResponse,
    StatsResponse,
};
use crate::resilience::{CircuitBreaker, CircuitState, RetryEngine};
use crate::shield::Shield;

/// Upstream dependencies the service guards, one breaker each.
pub const UPSTREAMS: [&str; 2] = ["ai_generation", "metadata_lookup"];

/// Application state shared across all handlers.
///
/// Holds the shared cache, every registered circuit breaker and the retry
/// engine the shields are built with.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache store
    pub cache: SharedCache<serde_json::Value>,
    /// Breakers in registration order
    pub breakers: Arc<Vec<Arc<CircuitBreaker>>>,
    /// Retry engine handed to every shield
    pub retry: RetryEngine,
}

impl AppState {
    /// Creates a new AppState with the given cache store and breakers.
    pub fn new(cache: CacheStore<serde_json::Value>, breakers: Vec<Arc<CircuitBreaker>>) -> Self {
        Self {
            cache: shared(cache),
            breakers: Arc::new(breakers),
            retry: RetryEngine::default(),
        }
    }

    /// Replaces the retry engine used by [`shield`](Self::shield).
    pub fn with_retry(mut self, retry: RetryEngine) -> Self {
        self.retry = retry;
        self
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the cache from the configured capacity and TTL table, and one
    /// breaker per entry of [`UPSTREAMS`].
    pub fn from_config(config: &Config) -> Self {
        let cache = CacheStore::new(config.max_entries, config.ttl_policy.clone());
        let breakers = UPSTREAMS
            .iter()
            .map(|name| Arc::new(CircuitBreaker::new(*name, config.breaker.clone())))
            .collect();
        Self::new(cache, breakers).with_retry(RetryEngine::new(config.retry.clone()))
    }

    /// Looks up a breaker by name.
    pub fn breaker(&self, name: &str) -> Option<&Arc<CircuitBreaker>> {
        self.breakers.iter().find(|b| b.name() == name)
    }

    /// Builds the shield guarding the named upstream.
    ///
    /// Every shield shares the one cache, so its traffic shows up in
    /// `/stats` and is swept by the cleanup task.
    pub fn shield(&self, name: &str) -> Option<Shield<serde_json::Value>> {
        let breaker = self.breaker(name)?;
        Some(Shield::new(
            self.cache.clone(),
            breaker.clone(),
            self.retry.clone(),
        ))
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
///
/// Returns cache statistics and every breaker's stats.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await.stats();
    let breakers = state.breakers.iter().map(|b| b.stats()).collect();

    Json(StatsResponse::new(cache, breakers))
}

/// Handler for POST /cache/cleanup
///
/// Runs an expiry sweep immediately instead of waiting for the background task.
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<CleanupResponse> {
    let mut cache = state.cache.write().await;
    let removed = cache.cleanup();

    Json(CleanupResponse {
        removed,
        remaining: cache.len(),
    })
}

/// Handler for DELETE /cache
///
/// Drops every entry and resets the statistics.
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = {
        let mut cache = state.cache.write().await;
        let cleared = cache.len();
        cache.clear();
        cleared
    };
    info!(cleared, "cache cleared via admin API");

    Json(ClearResponse::new(cleared))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.cache.write().await.delete(&key);
    if !removed {
        return Err(ApiError::NotFound(format!("key '{}'", key)));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /breakers/:name/reset
///
/// Forces the named breaker closed.
pub async fn reset_breaker_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerResetResponse>> {
    let breaker = state
        .breaker(&name)
        .ok_or_else(|| ApiError::NotFound(format!("breaker '{}'", name)))?;

    let previous_state = breaker.state();
    breaker.reset();
    info!(breaker = %name, from = %previous_state, "breaker reset via admin API");

    Ok(Json(BreakerResetResponse {
        name,
        previous_state,
        state: CircuitState::Closed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::policy::{STABLE, VOLATILE};
    use crate::cache::TtlPolicy;
    use crate::clock::ManualClock;
    use crate::error::UpstreamError;
    use crate::resilience::BreakerConfig;
    use serde_json::json;
    use std::time::Duration;

    fn test_state() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let cache = CacheStore::new(100, TtlPolicy::new()).with_clock(clock.clone());
        let breaker = CircuitBreaker::new(
            "ai_generation",
            BreakerConfig {
                failure_threshold: 1,
                ..BreakerConfig::default()
            },
        )
        .with_clock(clock.clone());
        (AppState::new(cache, vec![Arc::new(breaker)]), clock)
    }

    #[test]
    fn test_from_config_registers_every_upstream() {
        let state = AppState::from_config(&Config::default());
        assert_eq!(state.breakers.len(), UPSTREAMS.len());
        for name in UPSTREAMS {
            assert!(state.breaker(name).is_some());
        }
        assert!(state.breaker("unknown").is_none());
        assert_eq!(state.retry.config(), &Config::default().retry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shield_shares_state() {
        let (state, _) = test_state();
        let shield = state.shield("ai_generation").unwrap();
        assert!(state.shield("unknown").is_none());

        let value = shield
            .fetch("prompt:x", STABLE, "ai.generate", || async {
                Ok::<_, UpstreamError>(json!({"summary": "short"}))
            })
            .await
            .unwrap();
        assert_eq!(value["summary"], "short");

        assert!(state.cache.write().await.has("prompt:x"));
        assert_eq!(state.breakers[0].stats().total_calls, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = test_state();
        {
            let mut cache = state.cache.write().await;
            cache.set("a", json!(1), STABLE, None);
            cache.get("a");
            cache.get("b");
        }

        let response = stats_handler(State(state)).await;
        assert_eq!(response.cache.hits, 1);
        assert_eq!(response.cache.misses, 1);
        assert_eq!(response.hit_rate, 0.5);
        assert_eq!(response.breakers.len(), 1);
        assert_eq!(response.breakers[0].state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_cleanup_handler() {
        let (state, clock) = test_state();
        {
            let mut cache = state.cache.write().await;
            cache.set("short", json!("x"), VOLATILE, None);
            cache.set("long", json!("y"), STABLE, None);
        }
        clock.advance(Duration::from_secs(301));

        let response = cleanup_handler(State(state)).await;
        assert_eq!(response.removed, 1);
        assert_eq!(response.remaining, 1);
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let (state, _) = test_state();
        state.cache.write().await.set("a", json!(1), STABLE, None);

        let response = clear_handler(State(state.clone())).await;
        assert_eq!(response.cleared, 1);
        assert!(state.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (state, _) = test_state();
        state.cache.write().await.set("to_delete", json!(1), STABLE, None);

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reset_breaker_handler() {
        let (state, _) = test_state();
        let breaker = state.breaker("ai_generation").unwrap().clone();
        let _ = breaker
            .execute(|| async { Err::<(), _>(UpstreamError::new("down")) })
            .await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let response = reset_breaker_handler(State(state), Path("ai_generation".to_string()))
            .await
            .unwrap();
        assert_eq!(response.previous_state, CircuitState::Open);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_reset_unknown_breaker() {
        let (state, _) = test_state();
        let result = reset_breaker_handler(State(state), Path("nope".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
