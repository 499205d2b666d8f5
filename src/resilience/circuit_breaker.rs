//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast or divert to a fallback
//! - Half-Open: calls pass through as recovery probes
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first call after reset_timeout has elapsed since the last failure
//! Half-Open → Closed: success_threshold consecutive successes
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - One breaker per protected upstream, created at startup and shared
//! - The Open → Half-Open check happens lazily at call time; no timers
//! - State lives behind a `parking_lot::Mutex` held only for bookkeeping,
//!   never across an `.await`

use std::fmt;
use std::future::{Future, Ready};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::{duration_ms, Clock, SystemClock};
use crate::error::BreakerError;
use crate::observer::{BreakerObserver, TracingObserver};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - calls are short-circuited without executing
    Open,
    /// Testing recovery - calls run as probes
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

// == Breaker Config ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip a closed circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,
    /// Quiet period after the last failure before probing
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

// == Breaker Stats ==
/// Point-in-time view of a breaker, for logs and the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Unix milliseconds of the most recent failure
    pub last_failure_at: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
    /// Calls short-circuited while open
    pub total_rejections: u64,
    /// Calls answered by a fallback
    pub total_fallbacks: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<u64>,
    total_calls: u64,
    total_failures: u64,
    total_rejections: u64,
    total_fallbacks: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            total_calls: 0,
            total_failures: 0,
            total_rejections: 0,
            total_fallbacks: 0,
        }
    }
}

type Transition = Option<(CircuitState, CircuitState)>;

/// Fallback type used when the caller supplies none.
type NoFallback<T> = fn() -> Ready<T>;

// == Circuit Breaker ==
/// Three-state circuit breaker guarding one upstream dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Upstream name for logging and stats
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn BreakerObserver>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::new()),
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Get current circuit state. Does not evaluate the lazy reset.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get current stats snapshot.
    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock();
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            last_failure_at: inner.last_failure_at,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
            total_fallbacks: inner.total_fallbacks,
        }
    }

    // == Execute ==
    /// Execute an operation with circuit breaker protection.
    ///
    /// While open the operation is not invoked and the call fails with
    /// [`BreakerError::Open`]. Operation failures come back as
    /// [`BreakerError::Upstream`].
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(operation, None::<NoFallback<T>>).await
    }

    /// Like [`execute`](Self::execute), but answers from `fallback` whenever
    /// the circuit is open, including when this call's own failure opened it.
    pub async fn execute_with_fallback<T, E, F, Fut, FB, FbFut>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = T>,
    {
        self.run(operation, Some(fallback)).await
    }

    async fn run<T, E, F, Fut, FB, FbFut>(
        &self,
        operation: F,
        fallback: Option<FB>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = T>,
    {
        let (allowed, transition) = self.admit(fallback.is_some());
        self.notify(transition);

        if !allowed {
            self.observer.on_rejected(&self.name, fallback.is_some());
            return match fallback {
                Some(fallback) => Ok(fallback().await),
                None => Err(BreakerError::Open {
                    name: self.name.clone(),
                }),
            };
        }

        match operation().await {
            Ok(value) => {
                let transition = self.record_success();
                self.notify(transition);
                Ok(value)
            }
            Err(error) => {
                let (state, transition) = self.record_failure(fallback.is_some());
                self.notify(transition);
                match fallback {
                    Some(fallback) if state == CircuitState::Open => Ok(fallback().await),
                    _ => Err(BreakerError::Upstream(error)),
                }
            }
        }
    }

    /// Decides whether a call may run, applying the lazy Open → Half-Open
    /// transition first.
    fn admit(&self, has_fallback: bool) -> (bool, Transition) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.total_calls += 1;

        let mut transition = None;
        if inner.state == CircuitState::Open {
            let quiet_for = inner
                .last_failure_at
                .map(|at| now.saturating_sub(at))
                .unwrap_or(u64::MAX);
            if quiet_for > duration_ms(self.config.reset_timeout) {
                inner.state = CircuitState::HalfOpen;
                inner.consecutive_successes = 0;
                transition = Some((CircuitState::Open, CircuitState::HalfOpen));
            }
        }

        let allowed = inner.state != CircuitState::Open;
        if !allowed {
            inner.total_rejections += 1;
            if has_fallback {
                inner.total_fallbacks += 1;
            }
        }
        (allowed, transition)
    }

    fn record_success(&self) -> Transition {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    Some((CircuitState::HalfOpen, CircuitState::Closed))
                } else {
                    None
                }
            }
            // A call admitted before another one opened the circuit.
            CircuitState::Open => None,
        }
    }

    fn record_failure(&self, has_fallback: bool) -> (CircuitState, Transition) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.last_failure_at = Some(now);

        let transition = match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    Some(Self::trip(&mut inner, CircuitState::Closed))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => Some(Self::trip(&mut inner, CircuitState::HalfOpen)),
            CircuitState::Open => None,
        };

        if inner.state == CircuitState::Open && has_fallback {
            inner.total_fallbacks += 1;
        }
        (inner.state, transition)
    }

    /// Opens the circuit and starts a fresh counting cycle.
    fn trip(inner: &mut BreakerState, from: CircuitState) -> (CircuitState, CircuitState) {
        inner.state = CircuitState::Open;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        (from, CircuitState::Open)
    }

    // == Reset ==
    /// Forces the circuit closed and clears the consecutive counters.
    /// Lifetime totals are kept.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            let from = inner.state;
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.consecutive_successes = 0;
            inner.last_failure_at = None;
            (from != CircuitState::Closed).then_some((from, CircuitState::Closed))
        };
        self.notify(transition);
    }

    fn notify(&self, transition: Transition) {
        if let Some((from, to)) = transition {
            self.observer.on_state_change(&self.name, from, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Default)]
    struct RecordingObserver {
        transitions: Mutex<Vec<(CircuitState, CircuitState)>>,
        rejections: AtomicU32,
    }

    impl BreakerObserver for RecordingObserver {
        fn on_state_change(&self, _name: &str, from: CircuitState, to: CircuitState) {
            self.transitions.lock().push((from, to));
        }

        fn on_rejected(&self, _name: &str, _fallback: bool) {
            self.rejections.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn breaker(
        failure_threshold: u32,
        success_threshold: u32,
    ) -> (CircuitBreaker, Arc<ManualClock>, Arc<RecordingObserver>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let observer = Arc::new(RecordingObserver::default());
        let config = BreakerConfig {
            failure_threshold,
            success_threshold,
            reset_timeout: Duration::from_secs(60),
        };
        let breaker = CircuitBreaker::new("test", config)
            .with_clock(clock.clone())
            .with_observer(observer.clone());
        (breaker, clock, observer)
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<u32, BreakerError<String>> {
        breaker.execute(|| async { Err("boom".to_string()) }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, BreakerError<String>> {
        breaker.execute(|| async { Ok(1) }).await
    }

    #[test]
    fn test_default_config() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.reset_timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_circuit_breaker_normal_operation() {
        let (breaker, _, _) = breaker(3, 3);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(assert_ok!(succeed(&breaker).await), 1);

        let stats = breaker.stats();
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.total_failures, 0);
        assert_eq!(stats.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_upstream_error_is_propagated() {
        let (breaker, _, _) = breaker(3, 3);

        let err = assert_err!(fail(&breaker).await);
        assert!(matches!(err, BreakerError::Upstream(ref e) if e == "boom"));
        assert_eq!(breaker.stats().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let (breaker, _, observer) = breaker(3, 3);

        for _ in 0..2 {
            let _ = fail(&breaker).await;
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        let _ = fail(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.stats().last_failure_at, Some(1_000_000));
        assert_eq!(
            *observer.transitions.lock(),
            vec![(CircuitState::Closed, CircuitState::Open)]
        );
    }

    #[tokio::test]
    async fn test_intermittent_failure_never_trips() {
        let (breaker, _, _) = breaker(3, 3);

        for _ in 0..10 {
            let _ = fail(&breaker).await;
            let _ = fail(&breaker).await;
            assert_ok!(succeed(&breaker).await);
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_open_short_circuits_without_invoking() {
        let (breaker, clock, observer) = breaker(3, 3);
        let calls = &AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        clock.advance(Duration::from_secs(30));
        let result: Result<u32, BreakerError<String>> = breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;

        let err = assert_err!(result);
        assert!(err.is_open());
        assert_eq!(err.to_string(), "circuit breaker 'test' is open");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(observer.rejections.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.stats().total_rejections, 1);
    }

    #[tokio::test]
    async fn test_open_uses_fallback() {
        let (breaker, clock, _) = breaker(3, 3);
        let calls = &AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        clock.advance(Duration::from_secs(30));
        let result: Result<&str, BreakerError<String>> = breaker
            .execute_with_fallback(
                || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("live")
                },
                || async { "fallback" },
            )
            .await;

        assert_eq!(assert_ok!(result), "fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.stats().total_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_tripping_failure_uses_fallback() {
        let (breaker, _, _) = breaker(2, 3);
        let _ = fail(&breaker).await;

        let result: Result<&str, BreakerError<String>> = breaker
            .execute_with_fallback(
                || async { Err("boom".to_string()) },
                || async { "fallback" },
            )
            .await;

        assert_eq!(assert_ok!(result), "fallback");
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_failure_below_threshold_propagates_despite_fallback() {
        let (breaker, _, _) = breaker(3, 3);

        let result: Result<&str, BreakerError<String>> = breaker
            .execute_with_fallback(
                || async { Err("boom".to_string()) },
                || async { "fallback" },
            )
            .await;

        assert!(matches!(assert_err!(result), BreakerError::Upstream(_)));
        assert_eq!(breaker.stats().total_fallbacks, 0);
    }

    #[tokio::test]
    async fn test_half_open_after_reset_timeout() {
        let (breaker, clock, observer) = breaker(3, 3);
        let calls = &AtomicU32::new(0);
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        // Exactly reset_timeout is not enough.
        clock.advance(Duration::from_secs(60));
        assert!(assert_err!(succeed(&breaker).await).is_open());

        clock.advance(Duration::from_millis(1));
        let result: Result<u32, BreakerError<String>> = breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;

        assert_eq!(assert_ok!(result), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.stats().consecutive_successes, 1);
        assert_eq!(
            observer.transitions.lock().last(),
            Some(&(CircuitState::Open, CircuitState::HalfOpen))
        );
    }

    #[tokio::test]
    async fn test_huge_reset_timeout_stays_open() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            // Whole milliseconds overflow u64 here
            reset_timeout: Duration::from_secs(18_446_744_073_709_552),
        };
        let breaker = CircuitBreaker::new("test", config).with_clock(clock.clone());
        let calls = &AtomicU32::new(0);
        let _ = fail(&breaker).await;

        clock.advance(Duration::from_secs(1));
        let result: Result<u32, BreakerError<String>> = breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;

        assert!(assert_err!(result).is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_success_threshold() {
        let (breaker, clock, observer) = breaker(3, 3);
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        clock.advance(Duration::from_secs(61));

        assert_ok!(succeed(&breaker).await);
        assert_ok!(succeed(&breaker).await);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_ok!(succeed(&breaker).await);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(
            *observer.transitions.lock(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_immediately() {
        let (breaker, clock, _) = breaker(3, 3);
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        clock.advance(Duration::from_secs(61));

        assert_ok!(succeed(&breaker).await);
        assert_ok!(succeed(&breaker).await);
        let _ = fail(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.stats().consecutive_successes, 0);
        assert_eq!(breaker.stats().last_failure_at, Some(1_061_000));

        // The reset window restarts from the half-open failure.
        clock.advance(Duration::from_secs(30));
        assert!(assert_err!(succeed(&breaker).await).is_open());
    }

    #[tokio::test]
    async fn test_reset_forces_closed() {
        let (breaker, _, observer) = breaker(1, 3);
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().last_failure_at, None);
        assert_eq!(breaker.stats().total_failures, 1);
        assert_eq!(
            observer.transitions.lock().last(),
            Some(&(CircuitState::Open, CircuitState::Closed))
        );
        assert_ok!(succeed(&breaker).await);
    }

    #[tokio::test]
    async fn test_introspection_is_idempotent() {
        let (breaker, clock, _) = breaker(2, 3);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(120));

        let stats = breaker.stats();
        for _ in 0..5 {
            assert_eq!(breaker.state(), CircuitState::Open);
            assert_eq!(breaker.stats(), stats);
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_state() {
        let (breaker, _, _) = breaker(5, 3);
        let breaker = Arc::new(breaker);

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let breaker = breaker.clone();
                tokio::spawn(async move { fail(&breaker).await })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.stats().total_failures, 5);
    }
}
