use serde::{Deserialize, Serialize};

/// Requests-per-second and burst size for one service, plus an optional
/// global override. Invariant: both rates are positive finite numbers;
/// burst >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst_size: u32,
    #[serde(default)]
    pub global_requests_per_second: Option<f64>,
}

impl RateLimitConfig {
    pub fn is_valid(&self) -> bool {
        self.requests_per_second.is_finite()
            && self.requests_per_second > 0.0
            && self.burst_size >= 1
            && self
                .global_requests_per_second
                .is_none_or(|g| g.is_finite() && g > 0.0)
    }
}
