//! Retry policy with exponential backoff for target API requests.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::domain::models::config::RetryConfig;

use super::error::{ApiError, RequestKind};

/// Exponential backoff retry.
///
/// Backoff doubles with each attempt, capped at `max_backoff_ms`; a
/// Retry-After header from the target overrides the computed backoff.
/// Whether an error is retried at all depends on the [`RequestKind`]:
/// mutating requests are never replayed after a 4xx, 429 included.
pub struct RetryPolicy {
    /// Maximum number of retries before giving up.
    pub max_retries: u32,

    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    /// Execute `operation`, retrying per the policy.
    ///
    /// The operation is a future factory so each attempt builds a fresh
    /// request.
    pub async fn execute<F, Fut, T>(&self, kind: RequestKind, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if attempt >= self.max_retries || !err.is_retryable(kind) {
                        return Err(err);
                    }

                    let backoff = err
                        .retry_after_secs()
                        .map_or_else(|| self.calculate_backoff(attempt), Duration::from_secs);

                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying request after transient failure"
                    );

                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// `initial * 2^attempt`, capped at `max_backoff_ms`.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}
