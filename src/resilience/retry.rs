//! Retry logic.
//!
//! # Responsibilities
//! - Classify a failure as transient or permanent
//! - Re-run transient failures with exponential backoff + jitter
//! - Stop at the attempt cap and report how many attempts were made
//!
//! # Design Decisions
//! - Attempts are strictly sequential; the next one starts only after the
//!   previous one has failed and the backoff has elapsed
//! - Jittered backoff prevents thundering herd
//! - Sleeping goes through `tokio::time`, so paused-clock tests run instantly
//! - No cancel API; dropping the returned future stops the loop

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{RetryError, UpstreamError};
use crate::observer::{RetryObserver, TracingObserver};
use crate::resilience::backoff::{calculate_backoff, Jitter, RandomJitter};

/// Message fragments (lower case) that mark an error as transient.
pub const RETRYABLE_MESSAGE_PATTERNS: [&str; 5] = [
    "rate limit",
    "timeout",
    "network",
    "temporarily unavailable",
    "service unavailable",
];

// == Classify ==
/// What the retry engine needs to know about an error.
pub trait Classify: fmt::Display {
    /// Transport-level code, e.g. `ECONNRESET`.
    fn code(&self) -> Option<&str> {
        None
    }

    /// HTTP-like response status.
    fn status(&self) -> Option<u16> {
        None
    }
}

impl Classify for UpstreamError {
    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn status(&self) -> Option<u16> {
        self.status
    }
}

impl Classify for String {}

impl Classify for &str {}

impl Classify for std::io::Error {
    fn code(&self) -> Option<&str> {
        use std::io::ErrorKind;
        match self.kind() {
            ErrorKind::ConnectionReset => Some("ECONNRESET"),
            ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
            ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
            ErrorKind::TimedOut => Some("ETIMEDOUT"),
            ErrorKind::BrokenPipe => Some("EPIPE"),
            _ => None,
        }
    }
}

// == Retry Config ==
/// Retry loop parameters and the retryable classification lists.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Cap on invocations of the operation, first one included
    pub max_attempts: u32,
    /// Delay after the first failure, before jitter
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Error codes treated as transient
    pub retryable_codes: HashSet<String>,
    /// Response statuses treated as transient
    pub retryable_statuses: HashSet<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            backoff_multiplier: 1.5,
            max_delay: Duration::from_millis(10_000),
            retryable_codes: ["ECONNRESET", "ETIMEDOUT", "ECONNREFUSED", "ENOTFOUND", "EAI_AGAIN"]
                .into_iter()
                .map(String::from)
                .collect(),
            retryable_statuses: HashSet::from([408, 429, 500, 502, 503, 504]),
        }
    }
}

impl RetryConfig {
    // == Is Retryable ==
    /// Returns whether `error` is transient under this configuration.
    ///
    /// Transient if its code or status is listed, or its message contains
    /// one of [`RETRYABLE_MESSAGE_PATTERNS`] (case-insensitive).
    pub fn is_retryable<E: Classify + ?Sized>(&self, error: &E) -> bool {
        if error.code().is_some_and(|code| self.retryable_codes.contains(code)) {
            return true;
        }
        if error.status().is_some_and(|status| self.retryable_statuses.contains(&status)) {
            return true;
        }

        let message = error.to_string().to_lowercase();
        RETRYABLE_MESSAGE_PATTERNS
            .iter()
            .any(|pattern| message.contains(pattern))
    }

    /// Delay before the attempt following `attempt`, given a jitter factor.
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        calculate_backoff(
            attempt,
            self.base_delay,
            self.backoff_multiplier,
            self.max_delay,
            jitter,
        )
    }
}

// == Retry Attempt ==
/// One failed attempt about to be retried.
#[derive(Clone, Copy)]
pub struct RetryAttempt<'a> {
    /// The attempt that just failed, 1-based
    pub attempt: u32,
    /// Backoff before the next attempt
    pub delay: Duration,
    /// The failure
    pub error: &'a dyn fmt::Display,
}

impl fmt::Debug for RetryAttempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAttempt")
            .field("attempt", &self.attempt)
            .field("delay", &self.delay)
            .field("error", &self.error.to_string())
            .finish()
    }
}

// == Retry Engine ==
/// Runs fallible async operations with bounded, jittered retries.
#[derive(Debug, Clone)]
pub struct RetryEngine {
    config: RetryConfig,
    jitter: Arc<dyn Jitter>,
    observer: Arc<dyn RetryObserver>,
}

impl RetryEngine {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            jitter: Arc::new(RandomJitter),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replaces the jitter source.
    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    // == Execute ==
    /// Runs `operation` with the engine's default configuration.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: F,
        context: &str,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.execute_with_config(operation, context, &self.config)
            .await
    }

    /// Runs `operation` until it succeeds, fails permanently, or has run
    /// `config.max_attempts` times.
    ///
    /// Non-retryable errors stop the loop immediately. Either way the last
    /// error comes back wrapped in a [`RetryError`] with the attempt count.
    pub async fn execute_with_config<T, E, F, Fut>(
        &self,
        mut operation: F,
        context: &str,
        config: &RetryConfig,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let max_attempts = config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(context, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let retryable = config.is_retryable(&error);
            if !retryable || attempt >= max_attempts {
                self.observer
                    .on_give_up(context, attempt, retryable, &error);
                return Err(RetryError {
                    error,
                    context: context.to_string(),
                    attempts: attempt,
                    retryable,
                });
            }

            let delay = config.delay_for(attempt, self.jitter.factor());
            self.observer.on_retry(
                context,
                &RetryAttempt {
                    attempt,
                    delay,
                    error: &error,
                },
            );
            drop(error);

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
