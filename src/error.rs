//! Error types for the resilience layer
//!
//! Provides unified error handling using thiserror. A cache miss is never an
//! error; it is `None`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Upstream Error ==
/// A failed upstream call, carrying whatever the caller knows about it.
///
/// `code` is a transport-level code such as `ECONNRESET`; `status` is an
/// HTTP-like status from the upstream response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Error from an upstream response with the given status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(message).with_status(status)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

// == Retry Error ==
/// The only error that leaves the retry engine: the last upstream error, the
/// operation's context label and how many attempts were made.
#[derive(Error, Debug)]
#[error("{context} failed after {attempts} attempt(s): {error}")]
pub struct RetryError<E> {
    /// Error returned by the final attempt
    pub error: E,
    /// Label of the operation, e.g. `openai.summarize`
    pub context: String,
    /// Number of times the operation ran
    pub attempts: u32,
    /// Whether the final error was classified as retryable
    pub retryable: bool,
}

impl<E> RetryError<E> {
    /// Unwraps the final upstream error.
    pub fn into_inner(self) -> E {
        self.error
    }
}

// == Breaker Error ==
/// Errors that can occur during circuit breaker operation.
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// Circuit is open and no fallback was supplied; the operation never ran.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The operation ran and failed.
    #[error("{0}")]
    Upstream(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

// == Shield Error ==
/// Error from a cached, breaker-guarded, retried fetch.
#[derive(Error, Debug)]
pub enum ShieldError<E> {
    /// The dependency was deliberately not called.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// The dependency was called and failed on every attempt.
    #[error("{0}")]
    Upstream(RetryError<E>),
}

impl<E> From<BreakerError<RetryError<E>>> for ShieldError<E> {
    fn from(err: BreakerError<RetryError<E>>) -> Self {
        match err {
            BreakerError::Open { name } => ShieldError::CircuitOpen { name },
            BreakerError::Upstream(err) => ShieldError::Upstream(err),
        }
    }
}

// == Api Error ==
/// Errors surfaced by the admin HTTP API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unknown key or breaker
    #[error("Not found: {0}")]
    NotFound(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the admin API.
pub type Result<T> = std::result::Result<T, ApiError>;
