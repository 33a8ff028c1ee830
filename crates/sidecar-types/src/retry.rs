use serde::{Deserialize, Serialize};

/// Maximum attempts, backoff shape, and which HTTP status codes are
/// considered retryable. Invariant: multiplier >= 1; initial <= max.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            retryable_status_codes: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn is_valid(&self) -> bool {
        self.backoff_multiplier >= 1.0 && self.initial_backoff_ms <= self.max_backoff_ms
    }
}
