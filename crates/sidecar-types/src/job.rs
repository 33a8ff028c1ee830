use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;
use crate::request_spec::HttpRequestSpec;
use crate::retry::RetryConfig;

/// The closed set of actions a [`Job`] may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Upload,
    HttpUpload,
    Login,
    Verify,
    ListGalleries,
    CreateGallery,
    FinalizeGallery,
    GenerateThumb,
    ViperLogin,
    ViperPost,
}

impl Action {
    /// Actions whose validation requires a non-empty file list.
    pub fn requires_files(self) -> bool {
        matches!(self, Action::Upload | Action::HttpUpload | Action::GenerateThumb)
    }

    /// Actions whose validation requires a non-empty service tag.
    pub fn requires_service(self) -> bool {
        !matches!(self, Action::GenerateThumb)
    }
}

/// A request for the sidecar to perform one unit of work. Value-semantic:
/// once dispatched to a worker, a Job is not mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub action: Action,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub credentials: HashMap<String, String>,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub request: Option<HttpRequestSpec>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Job {
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Parses a positive integer config value, falling back to `default` if
    /// absent, non-numeric, or non-positive.
    pub fn config_usize(&self, key: &str, default: usize) -> usize {
        self.config
            .get(key)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default)
    }

    /// The `threads` hint: how many files within this job may upload
    /// concurrently. Orthogonal to the top-level worker pool size.
    pub fn threads(&self) -> usize {
        self.config_usize("threads", 2)
    }

    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}
