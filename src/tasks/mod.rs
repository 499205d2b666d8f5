//! Background Tasks Module
//!
//! Contains background tasks that run periodically during service operation.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at configured intervals
//! - Stats Reporter: Logs cache and circuit breaker stats at configured intervals

mod cleanup;
mod stats;

pub use cleanup::spawn_cleanup_task;
pub use stats::spawn_stats_reporter;
