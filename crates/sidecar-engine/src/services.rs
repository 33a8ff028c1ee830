use std::time::Duration;

use sidecar_ratelimit::RateLimiterRegistry;
use sidecar_session::SessionStore;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// The process-wide singletons every job handler shares (§9 Design Notes:
/// per-service state as process-wide singletons; one shared HTTP client).
/// Built once at startup, never destroyed.
pub struct Services {
    pub client: reqwest::Client,
    pub session: SessionStore,
    pub rate_limiter: RateLimiterRegistry,
}

impl Services {
    pub fn build() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().cookie_store(true).timeout(CLIENT_TIMEOUT).build()?;
        Ok(Self { client, session: SessionStore::new(), rate_limiter: RateLimiterRegistry::new() })
    }
}
