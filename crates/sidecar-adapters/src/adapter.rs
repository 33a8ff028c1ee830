use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sidecar_multipart::ProgressCallback;
use sidecar_ratelimit::RateLimiterRegistry;
use sidecar_retry::RetryNotify;
use sidecar_session::SessionStore;
use sidecar_types::RetryConfig;
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;
use crate::types::{GalleryDescriptor, UrlPair};

/// Resources every adapter call needs, borrowed for the call's duration.
pub struct AdapterContext<'a> {
    pub client: &'a reqwest::Client,
    pub session: &'a SessionStore,
    pub rate_limiter: &'a RateLimiterRegistry,
    pub retry: &'a RetryConfig,
    pub cancel: &'a CancellationToken,
    pub progress: Option<ProgressCallback>,
    /// Called once if a retried call eventually succeeds, so the caller can
    /// surface it on the stdout protocol (§4.3).
    pub retry_log: Option<RetryNotify>,
}

/// One host's login/upload/gallery routines, selected by service tag from
/// a dynamic-dispatch table (§9 Design Notes) rather than an inheritance
/// hierarchy. Gallery operations default to "not supported"; finalization
/// defaults to an immediate success with no network call, matching §4.8's
/// contract that only one host truly finalizes.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn service(&self) -> &'static str;

    async fn login(
        &self,
        ctx: &AdapterContext<'_>,
        credentials: &HashMap<String, String>,
    ) -> Result<(), AdapterError>;

    async fn upload(
        &self,
        ctx: &AdapterContext<'_>,
        credentials: &HashMap<String, String>,
        file: &Path,
    ) -> Result<UrlPair, AdapterError>;

    async fn list_galleries(
        &self,
        _ctx: &AdapterContext<'_>,
        _credentials: &HashMap<String, String>,
    ) -> Result<Vec<GalleryDescriptor>, AdapterError> {
        Err(AdapterError::NotSupported)
    }

    async fn create_gallery(
        &self,
        _ctx: &AdapterContext<'_>,
        _credentials: &HashMap<String, String>,
        _name: &str,
    ) -> Result<String, AdapterError> {
        Err(AdapterError::NotSupported)
    }

    async fn finalize_gallery(
        &self,
        _ctx: &AdapterContext<'_>,
        _gallery_id: &str,
    ) -> Result<(), AdapterError> {
        Ok(())
    }
}
