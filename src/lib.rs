//! Upstream Shield - cache, retry and circuit breaking for flaky upstreams
//!
//! A per-category TTL cache with LRU eviction, a retry engine with
//! exponential backoff and jitter, and a circuit breaker, composed by
//! [`Shield`] in front of a single upstream dependency.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod observer;
pub mod resilience;
pub mod shield;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStore, SharedCache};
pub use config::Config;
pub use error::{BreakerError, RetryError, ShieldError, UpstreamError};
pub use resilience::{CircuitBreaker, CircuitState, RetryConfig, RetryEngine};
pub use shield::Shield;
pub use tasks::{spawn_cleanup_task, spawn_stats_reporter};
