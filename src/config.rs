//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::policy::CATEGORIES;
use crate::cache::TtlPolicy;
use crate::resilience::{BreakerConfig, RetryConfig};

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Stats reporter interval in seconds, 0 disables it
    pub stats_interval: u64,
    /// Admin HTTP server port
    pub server_port: u16,
    /// Category -> TTL table
    pub ttl_policy: TtlPolicy,
    /// Retry defaults shared by every upstream
    pub retry: RetryConfig,
    /// Breaker settings applied to every upstream
    pub breaker: BreakerConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 300)
    /// - `STATS_INTERVAL` - Stats log frequency in seconds (default: 60)
    /// - `SERVER_PORT` - Admin HTTP server port (default: 3000)
    /// - `RETRY_MAX_ATTEMPTS`, `RETRY_BASE_DELAY_MS`, `RETRY_BACKOFF_MULTIPLIER`,
    ///   `RETRY_MAX_DELAY_MS` - Retry loop (defaults: 3, 1000, 1.5, 10000)
    /// - `BREAKER_FAILURE_THRESHOLD`, `BREAKER_SUCCESS_THRESHOLD`,
    ///   `BREAKER_RESET_TIMEOUT_SECS` - Circuit breaker (defaults: 5, 3, 60)
    /// - `TTL_<CATEGORY>_SECS` - TTL override per category, e.g. `TTL_VOLATILE_SECS`
    ///
    /// Unset or unparsable variables fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| lookup(name);

        let mut ttl_policy = defaults.ttl_policy;
        for category in CATEGORIES {
            let name = format!("TTL_{}_SECS", category.to_uppercase());
            if let Some(secs) = parse::<u64>(read(&name)) {
                ttl_policy = ttl_policy.with_ttl(category, Duration::from_secs(secs));
            }
        }

        let retry = RetryConfig {
            max_attempts: parse(read("RETRY_MAX_ATTEMPTS")).unwrap_or(defaults.retry.max_attempts),
            base_delay: parse(read("RETRY_BASE_DELAY_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
            backoff_multiplier: parse(read("RETRY_BACKOFF_MULTIPLIER"))
                .unwrap_or(defaults.retry.backoff_multiplier),
            max_delay: parse(read("RETRY_MAX_DELAY_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.max_delay),
            ..defaults.retry
        };

        let breaker = BreakerConfig {
            failure_threshold: parse(read("BREAKER_FAILURE_THRESHOLD"))
                .unwrap_or(defaults.breaker.failure_threshold),
            success_threshold: parse(read("BREAKER_SUCCESS_THRESHOLD"))
                .unwrap_or(defaults.breaker.success_threshold),
            reset_timeout: parse(read("BREAKER_RESET_TIMEOUT_SECS"))
                .map(Duration::from_secs)
                .unwrap_or(defaults.breaker.reset_timeout),
        };

        Self {
            max_entries: parse(read("MAX_ENTRIES")).unwrap_or(defaults.max_entries),
            cleanup_interval: parse(read("CLEANUP_INTERVAL")).unwrap_or(defaults.cleanup_interval),
            stats_interval: parse(read("STATS_INTERVAL")).unwrap_or(defaults.stats_interval),
            server_port: parse(read("SERVER_PORT")).unwrap_or(defaults.server_port),
            ttl_policy,
            retry,
            breaker,
        }
    }
}

fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            cleanup_interval: 300,
            stats_interval: 60,
            server_port: 3000,
            ttl_policy: TtlPolicy::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}
