//! Exponential backoff with jitter.

use std::fmt;
use std::time::Duration;

use rand::Rng;

/// Lowest jitter factor; delays never drop below half the exponential value.
pub const MIN_JITTER: f64 = 0.5;
/// Jitter factors stay strictly below this.
pub const MAX_JITTER: f64 = 1.0;

// == Jitter Source ==
/// Source of the random factor applied to each backoff delay.
pub trait Jitter: Send + Sync + fmt::Debug {
    /// Returns a factor in `[0.5, 1.0)`.
    fn factor(&self) -> f64;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn factor(&self) -> f64 {
        rand::thread_rng().gen_range(MIN_JITTER..MAX_JITTER)
    }
}

/// Always returns the same factor. For tests and for callers that want
/// reproducible delays.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn factor(&self) -> f64 {
        self.0
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// `delay = min(max_delay, base_delay * multiplier^(attempt-1) * jitter)`,
/// where `attempt` is the attempt that just failed (1-based) and `jitter`
/// is clamped into `[0.5, 1.0]`.
pub fn calculate_backoff(
    attempt: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter: f64,
) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
    let max_ns = max_delay.as_nanos() as f64;
    let exponential_ns = base_delay.as_nanos() as f64 * multiplier.powi(exponent);
    let jitter = jitter.clamp(MIN_JITTER, MAX_JITTER);
    let delay_ns = exponential_ns * jitter;

    // NaN or an absurd multiplier lands on the cap.
    if !delay_ns.is_finite() || delay_ns >= max_ns {
        return max_delay;
    }
    Duration::from_nanos(delay_ns.max(0.0).round() as u64).min(max_delay)
}
