//! API Module
//!
//! HTTP handlers and routing for the admin / observability API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache and circuit breaker statistics
//! - `POST /cache/cleanup` - Sweep expired entries now
//! - `DELETE /cache` - Clear the cache
//! - `DELETE /cache/:key` - Delete a key
//! - `POST /breakers/:name/reset` - Force a breaker closed

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
