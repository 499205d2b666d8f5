//! Observer Module
//!
//! Hooks through which the cache, the retry engine and the circuit breaker
//! report what they did. Every method has a no-op default so an observer only
//! implements the events it cares about. [`TracingObserver`] is the default
//! used everywhere and turns events into `tracing` log lines.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::clock::duration_ms;
use crate::resilience::{CircuitState, RetryAttempt};

// == Removal Reason ==
/// Why an entry left the cache without an explicit delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Evicted to make room for a new key.
    Capacity,
    /// Its TTL elapsed.
    Expired,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::Capacity => write!(f, "capacity"),
            RemovalReason::Expired => write!(f, "expired"),
        }
    }
}

// == Cache Observer ==
/// Receives cache access and removal events.
pub trait CacheObserver: Send + Sync + fmt::Debug {
    fn on_hit(&self, _key: &str) {}
    fn on_miss(&self, _key: &str) {}
    fn on_remove(&self, _key: &str, _reason: RemovalReason) {}
}

// == Retry Observer ==
/// Receives retry loop events.
pub trait RetryObserver: Send + Sync + fmt::Debug {
    /// Called after a retryable failure, before sleeping `attempt.delay`.
    fn on_retry(&self, _context: &str, _attempt: &RetryAttempt<'_>) {}

    /// Called once when the loop stops without a success.
    fn on_give_up(&self, _context: &str, _attempts: u32, _retryable: bool, _error: &dyn fmt::Display) {}
}

// == Breaker Observer ==
/// Receives circuit breaker transitions and short-circuited calls.
pub trait BreakerObserver: Send + Sync + fmt::Debug {
    fn on_state_change(&self, _name: &str, _from: CircuitState, _to: CircuitState) {}
    fn on_rejected(&self, _name: &str, _fallback: bool) {}
}

// == Tracing Observer ==
/// Observer that logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_hit(&self, key: &str) {
        debug!(key, "cache hit");
    }

    fn on_miss(&self, key: &str) {
        debug!(key, "cache miss");
    }

    fn on_remove(&self, key: &str, reason: RemovalReason) {
        debug!(key, %reason, "cache entry removed");
    }
}

impl RetryObserver for TracingObserver {
    fn on_retry(&self, context: &str, attempt: &RetryAttempt<'_>) {
        warn!(
            context,
            attempt = attempt.attempt,
            delay_ms = duration_ms(attempt.delay),
            error = %attempt.error,
            "attempt failed, retrying"
        );
    }

    fn on_give_up(&self, context: &str, attempts: u32, retryable: bool, error: &dyn fmt::Display) {
        error!(context, attempts, retryable, error = %error, "giving up");
    }
}

impl BreakerObserver for TracingObserver {
    fn on_state_change(&self, name: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => error!(breaker = name, %from, %to, "circuit opened"),
            _ => info!(breaker = name, %from, %to, "circuit state changed"),
        }
    }

    fn on_rejected(&self, name: &str, fallback: bool) {
        debug!(breaker = name, fallback, "call short-circuited");
    }
}
