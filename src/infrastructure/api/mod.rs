//! HTTP transport for the target n8n REST API.
//!
//! Shared by the upload, update, and verification phases: authenticated
//! requests, per-request timeout, token-bucket rate limiting, and
//! method-aware retry with exponential backoff.

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use client::N8nApiClient;
pub use error::{ApiError, RequestKind};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
