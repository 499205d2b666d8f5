//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::resilience::{BreakerStats, CircuitState};

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// Number of entries dropped
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: format!("Cache cleared ({} entries)", cleared),
            cleared,
        }
    }
}

/// Response body for POST /cache/cleanup
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    /// Expired entries removed by this sweep
    pub removed: usize,
    /// Entries left afterwards
    pub remaining: usize,
}

/// Response body for POST /breakers/:name/reset
#[derive(Debug, Clone, Serialize)]
pub struct BreakerResetResponse {
    pub name: String,
    /// State before the reset
    pub previous_state: CircuitState,
    /// Always `closed`
    pub state: CircuitState,
}

/// Response body for the stats endpoint (GET /stats)
///
/// Cache counters are flattened into the top level next to the derived hit
/// rate; breakers are listed in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses)), 0 when nothing was read yet
    pub hit_rate: f64,
    pub breakers: Vec<BreakerStats>,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a cache and breaker snapshot
    pub fn new(cache: CacheStats, breakers: Vec<BreakerStats>) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            breakers,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
