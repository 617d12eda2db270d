//! Token-bucket rate limiter for target API requests.

use std::time::{Duration, Instant};

/// Token bucket over a fixed refill window.
///
/// Allows up to `capacity` requests per `window`. When the bucket is
/// exhausted, [`acquire`](RateLimiter::acquire) sleeps until the window
/// resets and a token becomes available. Owned by the API client and
/// discarded with it at end of run.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum tokens in the bucket.
    capacity: u32,
    /// Current available tokens.
    tokens: u32,
    /// Duration of the refill window.
    window: Duration,
    /// When the current window started.
    window_start: Instant,
}

impl RateLimiter {
    /// Create a limiter with the given capacity and window.
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            tokens: capacity.max(1),
            window,
            window_start: Instant::now(),
        }
    }

    /// Limiter sized for `requests_per_minute` over a 60 s window.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, Duration::from_secs(60))
    }

    /// Acquire a single token, sleeping if necessary.
    pub async fn acquire(&mut self) {
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.window {
            self.tokens = self.capacity;
            self.window_start = Instant::now();
        }

        if self.tokens > 0 {
            self.tokens -= 1;
        } else {
            let remaining = self.window.saturating_sub(elapsed);
            tracing::warn!(
                sleep_ms = remaining.as_millis() as u64,
                "client rate limit reached, sleeping until window resets"
            );
            tokio::time::sleep(remaining).await;
            self.tokens = self.capacity - 1;
            self.window_start = Instant::now();
        }
    }

    #[cfg(test)]
    fn available(&self) -> u32 {
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_full() {
        let limiter = RateLimiter::per_minute(100);
        assert_eq!(limiter.available(), 100);
    }

    #[tokio::test]
    async fn test_acquire_decrements_tokens() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.acquire().await;
        assert_eq!(limiter.available(), 4);
        limiter.acquire().await;
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test]
    async fn test_burst_up_to_capacity_is_immediate() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_exhausted_bucket_waits_for_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(200));
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "should sleep: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "should not oversleep: {elapsed:?}");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        assert_eq!(limiter.available(), 1);
    }
}
