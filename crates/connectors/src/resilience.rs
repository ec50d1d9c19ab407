//! Retry policy for the HTTP transport
//!
//! Retries are scoped to transport-level failures only: connection errors and
//! timeouts. Status errors - 4xx and 5xx alike - propagate un-retried; the
//! orchestration layer owns invocation-level retry, and retrying a 4xx would
//! burn quota on a request that cannot succeed.

use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Total attempts per logical request (1 initial + 2 retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Exponential backoff floor
pub const BACKOFF_FLOOR_SECS: u64 = 1;

/// Exponential backoff ceiling
pub const BACKOFF_CEILING_SECS: u64 = 30;

/// Resilience configuration for a connector's transport
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Total attempts per logical request
    pub max_attempts: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ResilienceConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before the retry following failed attempt N (0-based):
    /// `1s * 2^N`, clamped to [1s, 30s]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let secs = (BACKOFF_FLOOR_SECS << attempt.min(6))
            .clamp(BACKOFF_FLOOR_SECS, BACKOFF_CEILING_SECS);
        Duration::from_secs(secs)
    }
}

/// Whether an error is a transient transport failure worth retrying
pub fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}
