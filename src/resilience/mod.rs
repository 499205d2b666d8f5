//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream:
//!     → circuit_breaker.rs (short-circuit while open, track consecutive failures)
//!     → retry.rs (classify failure, retry transient ones)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - The breaker sees one outcome per retry loop, not one per attempt
//! - Only errors classified as transient are retried
//! - Breakers are explicit instances, one per upstream; no globals

pub mod backoff;
pub mod circuit_breaker;
pub mod retry;

pub use backoff::{FixedJitter, Jitter, RandomJitter};
pub use circuit_breaker::{BreakerConfig, BreakerStats, CircuitBreaker, CircuitState};
pub use retry::{Classify, RetryAttempt, RetryConfig, RetryEngine};
