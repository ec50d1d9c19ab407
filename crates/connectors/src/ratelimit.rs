//! Token bucket rate limiter for outbound request pacing
//!
//! Each connector instance owns one bucket, configured from
//! `SourceConfig::rate_limit_per_second`. The bucket refills continuously
//! rather than in fixed windows, so short bursts up to `capacity` are allowed
//! while the long-run average stays bounded by `rate`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::ConnectorError;

/// Continuous-refill token bucket
///
/// `acquire` suspends the calling task until a token is available, then
/// consumes it. All state mutation happens under one async mutex, and the
/// wait sleeps while holding it, so concurrent acquires on a shared bucket
/// cannot double-spend a token.
///
/// Cloning is cheap and shares state: a clone throttles against the same
/// bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Arc<Mutex<BucketState>>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    /// Add tokens for the time elapsed since the last refill, capped at capacity.
    fn refill(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

impl TokenBucket {
    /// Create a bucket whose burst capacity equals the refill rate
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Config` when `rate` is zero, negative, or not
    /// finite - a caller bug, rejected at construction.
    pub fn new(rate: f64) -> Result<Self, ConnectorError> {
        Self::with_capacity(rate, rate)
    }

    /// Create a bucket with an explicit burst capacity
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Config` when `rate` or `capacity` is not a
    /// positive finite number.
    pub fn with_capacity(rate: f64, capacity: f64) -> Result<Self, ConnectorError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConnectorError::Config(format!(
                "rate_limit_per_second must be a positive number, got {rate}"
            )));
        }
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(ConnectorError::Config(format!(
                "rate limiter capacity must be a positive number, got {capacity}"
            )));
        }
        Ok(Self {
            rate,
            capacity,
            state: Arc::new(Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
        })
    }

    /// Wait until a token is available, then consume it
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        state.refill(self.rate, self.capacity);
        if state.tokens < 1.0 {
            let wait = Duration::from_secs_f64((1.0 - state.tokens) / self.rate);
            tokio::time::sleep(wait).await;
            state.refill(self.rate, self.capacity);
        }
        state.tokens -= 1.0;
    }

    /// Current token count after a refill (approximate; for tests and metrics)
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(self.rate, self.capacity);
        state.tokens
    }

    /// Burst capacity of this bucket
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Refill rate in tokens/second
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(10.0).unwrap();
        assert_eq!(bucket.capacity(), 10.0);
        assert!(bucket.available().await >= 10.0 - f64::EPSILON);
    }

    #[tokio::test]
    async fn test_acquire_consumes_token() {
        let bucket = TokenBucket::new(10.0).unwrap();
        bucket.acquire().await;
        // Slightly above 9.0 is possible due to refill during the acquire
        assert!(bucket.available().await < 10.0);
    }

    #[tokio::test]
    async fn test_rapid_acquisition_drains_bucket() {
        let bucket = TokenBucket::with_capacity(5.0, 3.0).unwrap();
        for _ in 0..3 {
            bucket.acquire().await;
        }
        assert!(bucket.available().await < 1.0);
    }

    #[tokio::test]
    async fn test_acquire_blocks_when_empty() {
        let bucket = TokenBucket::with_capacity(10.0, 1.0).unwrap();
        bucket.acquire().await; // drain the single token

        let start = Instant::now();
        bucket.acquire().await; // should wait ~0.1s (1/rate)
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(50),
            "expected a blocking wait, got {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_burst_up_to_capacity_is_immediate() {
        let bucket = TokenBucket::with_capacity(2.0, 5.0).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert!(
            start.elapsed() < Duration::from_millis(100),
            "burst within capacity should not throttle"
        );
    }

    #[tokio::test]
    async fn test_throttles_past_capacity() {
        // 5 acquires from a capacity-2 bucket at 50/s: at least (5-2)/50 = 60ms
        let bucket = TokenBucket::with_capacity(50.0, 2.0).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert!(
            start.elapsed() >= Duration::from_millis(50),
            "sustained rate should be throttled, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_refill_does_not_exceed_capacity() {
        let bucket = TokenBucket::with_capacity(100.0, 5.0).unwrap();
        bucket.acquire().await;
        // Would refill 10+ tokens at rate=100 if uncapped
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(bucket.available().await <= 5.0);
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let bucket = TokenBucket::with_capacity(10.0, 5.0).unwrap();
        let clone = bucket.clone();

        bucket.acquire().await;
        bucket.acquire().await;

        assert!(clone.available().await < 4.0);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            TokenBucket::new(0.0),
            Err(ConnectorError::Config(_))
        ));
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(matches!(
            TokenBucket::new(-1.5),
            Err(ConnectorError::Config(_))
        ));
    }

    #[test]
    fn test_nan_rate_rejected() {
        assert!(matches!(
            TokenBucket::new(f64::NAN),
            Err(ConnectorError::Config(_))
        ));
    }

    #[test]
    fn test_capacity_defaults_to_rate() {
        let bucket = TokenBucket::new(7.5).unwrap();
        assert_eq!(bucket.capacity(), 7.5);
        assert_eq!(bucket.rate(), 7.5);
    }
}
