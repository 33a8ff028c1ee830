use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maximum depth of a pre-request `follow_up` chain (§9 Design Notes: bounded
/// linear chain, not a cycle).
pub const MAX_PRE_REQUEST_CHAIN_DEPTH: usize = 8;

fn default_method() -> String {
    "POST".to_string()
}

fn default_response_type() -> PreRequestResponseType {
    PreRequestResponseType::Json
}

/// How a single named field of a data-driven multipart upload is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Streams the job's file through the progress-instrumented writer.
    File,
    /// A literal string value.
    Text,
    /// Looked up by name in the pre-request's extraction map.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartFieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// A data-driven description of one upload request, allowing a new host to
/// be added without a new code path in the upload pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestSpec {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub fields: Vec<MultipartFieldSpec>,
    #[serde(default)]
    pub form_fields: HashMap<String, String>,
    #[serde(default)]
    pub pre_request: Option<PreRequestSpec>,
    pub response: ResponseParserSpec,
}

/// The response type a Pre-Request Spec expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreRequestResponseType {
    Json,
    Html,
}

/// A chained GET/POST used to obtain dynamic field values before the actual
/// upload. Recursively chainable via `follow_up_request`, bounded by
/// [`MAX_PRE_REQUEST_CHAIN_DEPTH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreRequestSpec {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub form_fields: HashMap<String, String>,
    /// Request a fresh, short-lived cookie jar for this sub-session.
    #[serde(default)]
    pub use_cookies: bool,
    /// Named extractions: name -> JSON dotted path or CSS-like selector.
    #[serde(default)]
    pub extract: HashMap<String, String>,
    #[serde(default = "default_response_type")]
    pub response_type: PreRequestResponseType,
    #[serde(default)]
    pub follow_up_request: Option<Box<PreRequestSpec>>,
}

impl PreRequestSpec {
    /// Length of this spec's follow-up chain, including itself.
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut cur = &self.follow_up_request;
        while let Some(next) = cur {
            len += 1;
            cur = &next.follow_up_request;
        }
        len
    }
}

/// How a response is parsed to recover `(image_url, thumb_url, status)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseParserKind {
    Json,
    Html,
    Regex,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseParserSpec {
    #[serde(rename = "type")]
    pub kind: ResponseParserKind,
    #[serde(default)]
    pub url_path: Option<String>,
    #[serde(default)]
    pub thumb_path: Option<String>,
    #[serde(default)]
    pub status_path: Option<String>,
    #[serde(default)]
    pub success_value: Option<String>,
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub thumb_template: Option<String>,
}
