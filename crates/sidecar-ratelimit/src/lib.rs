#![deny(unreachable_pub)]

//! Per-service and global token-bucket rate limiting (§4.2 Rate Limiter
//! Registry), built on `governor`'s GCRA implementation. One limiter guards
//! the aggregate request rate across all services; a second, independently
//! configured limiter guards each service tag. A request must clear both
//! before it is allowed through.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use sidecar_types::RateLimitConfig;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

type Limiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

const DEFAULT_GLOBAL_RPS: f64 = 10.0;
const DEFAULT_GLOBAL_BURST: u32 = 20;
const DEFAULT_SERVICE_RPS: f64 = 2.0;
const DEFAULT_SERVICE_BURST: u32 = 5;
const DEFAULT_FORUM_RPS: f64 = 1.0;
const DEFAULT_FORUM_BURST: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("wait for rate limiter was cancelled")]
    Cancelled,
}

struct TrackedLimiter {
    limiter: Arc<Limiter>,
    burst: u32,
}

fn build_limiter(requests_per_second: f64, burst: u32) -> Arc<Limiter> {
    let rps = if requests_per_second.is_finite() && requests_per_second > 0.0 {
        requests_per_second
    } else {
        1.0
    };
    let burst = NonZeroU32::new(burst.max(1)).expect("clamped to at least 1");
    let period = Duration::from_secs_f64(1.0 / rps);
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).expect("nonzero")))
        .allow_burst(burst);
    Arc::new(GovernorLimiter::direct(quota))
}

/// Starting point for a service not yet seen via `update`: the forum (Viper)
/// is throttled harder than the image hosts, which tolerate a faster drip.
fn default_quota_for(service: &str) -> (f64, u32) {
    if service.eq_ignore_ascii_case("viper") {
        (DEFAULT_FORUM_RPS, DEFAULT_FORUM_BURST)
    } else {
        (DEFAULT_SERVICE_RPS, DEFAULT_SERVICE_BURST)
    }
}

/// Registry of the global limiter plus one lazily created limiter per
/// service tag. Cheap to clone-share via `Arc`; safe to call from many
/// workers concurrently.
pub struct RateLimiterRegistry {
    clock: DefaultClock,
    global: RwLock<TrackedLimiter>,
    services: RwLock<HashMap<String, TrackedLimiter>>,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self {
            clock: DefaultClock::default(),
            global: RwLock::new(TrackedLimiter {
                limiter: build_limiter(DEFAULT_GLOBAL_RPS, DEFAULT_GLOBAL_BURST),
                burst: DEFAULT_GLOBAL_BURST,
            }),
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Blocks the caller until both the global and the per-service bucket
    /// have a token available, or until `cancel` fires (e.g. the job's
    /// per-file timeout or a shutdown signal).
    pub async fn wait(&self, service: &str, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        let global = self.global.read().await.limiter.clone();
        self.wait_on(&global, cancel).await?;
        let svc = self.service_limiter(service).await;
        self.wait_on(&svc, cancel).await
    }

    /// Replaces the per-service limiter's rate and burst. When
    /// `global_requests_per_second` is set, replaces the global limiter's
    /// rate too, preserving whatever burst it already had.
    pub async fn update(&self, service: &str, cfg: &RateLimitConfig) {
        let limiter = build_limiter(cfg.requests_per_second, cfg.burst_size);
        self.services.write().await.insert(
            service.to_string(),
            TrackedLimiter { limiter, burst: cfg.burst_size },
        );

        if let Some(global_rps) = cfg.global_requests_per_second {
            let mut global = self.global.write().await;
            global.limiter = build_limiter(global_rps, global.burst);
        }
    }

    async fn service_limiter(&self, service: &str) -> Arc<Limiter> {
        if let Some(existing) = self.services.read().await.get(service) {
            return existing.limiter.clone();
        }
        let mut services = self.services.write().await;
        if let Some(existing) = services.get(service) {
            return existing.limiter.clone();
        }
        let (rps, burst) = default_quota_for(service);
        let limiter = build_limiter(rps, burst);
        services.insert(service.to_string(), TrackedLimiter { limiter: limiter.clone(), burst });
        limiter
    }

    async fn wait_on(&self, limiter: &Limiter, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        loop {
            match limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => {
                    let wait = not_until.wait_time_from(self.clock.now());
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => continue,
                        _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_service_uses_default_quota_and_allows_immediate_calls_up_to_burst() {
        let registry = RateLimiterRegistry::new();
        let cancel = CancellationToken::new();
        for _ in 0..DEFAULT_SERVICE_BURST {
            registry.wait("imgbox", &cancel).await.unwrap();
        }
    }

    #[tokio::test]
    async fn update_narrows_a_services_quota() {
        let registry = RateLimiterRegistry::new();
        registry
            .update(
                "imgbox",
                &RateLimitConfig { requests_per_second: 1000.0, burst_size: 1, global_requests_per_second: None },
            )
            .await;
        let cancel = CancellationToken::new();
        registry.wait("imgbox", &cancel).await.unwrap();
        // second call would need to wait on the real clock; instead assert
        // the bucket is now exhausted without blocking the test suite.
        let svc = registry.service_limiter("imgbox").await;
        assert!(svc.check().is_err());
    }

    #[tokio::test]
    async fn update_preserves_existing_global_burst_when_only_rate_changes() {
        let registry = RateLimiterRegistry::new();
        registry
            .update(
                "imgbox",
                &RateLimitConfig {
                    requests_per_second: 5.0,
                    burst_size: 5,
                    global_requests_per_second: Some(2.0),
                },
            )
            .await;
        assert_eq!(registry.global.read().await.burst, DEFAULT_GLOBAL_BURST);
    }

    #[tokio::test]
    async fn cancellation_unblocks_an_exhausted_wait() {
        let registry = RateLimiterRegistry::new();
        registry
            .update(
                "forum",
                &RateLimitConfig { requests_per_second: 0.001, burst_size: 1, global_requests_per_second: None },
            )
            .await;
        let cancel = CancellationToken::new();
        registry.wait("forum", &cancel).await.unwrap();

        let cancel2 = cancel.clone();
        cancel2.cancel();
        let result = registry.wait("forum", &cancel2).await;
        assert!(matches!(result, Err(RateLimitError::Cancelled)));
    }
}
