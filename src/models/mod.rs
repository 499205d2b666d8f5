//! Response models for the admin API
//!
//! This module defines the DTOs (Data Transfer Objects) serialized into
//! HTTP response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{
    BreakerResetResponse, CleanupResponse, ClearResponse, DeleteResponse, ErrorResponse,
    HealthResponse, StatsResponse,
};
