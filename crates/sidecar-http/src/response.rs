use sidecar_types::{ResponseParserKind, ResponseParserSpec};

use crate::error::HttpError;
use crate::json_path::get_json_value;

/// The pair recovered from a successful upload response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUpload {
    pub image_url: String,
    pub thumb_url: Option<String>,
}

/// Parses an upload response per the spec's parser type. Only `json` is
/// required to succeed; the other parser kinds are reserved for hosts not
/// yet implemented and report [`HttpError::UnsupportedParser`].
pub async fn parse_upload_response(
    spec: &ResponseParserSpec,
    response: reqwest::Response,
) -> Result<ParsedUpload, HttpError> {
    match spec.kind {
        ResponseParserKind::Json => parse_json(spec, response).await,
        ResponseParserKind::Html | ResponseParserKind::Regex | ResponseParserKind::Direct => {
            Err(HttpError::UnsupportedParser)
        }
    }
}

async fn parse_json(spec: &ResponseParserSpec, response: reqwest::Response) -> Result<ParsedUpload, HttpError> {
    let body = response.text().await?;
    parse_json_body(spec, &body)
}

fn parse_json_body(spec: &ResponseParserSpec, body: &str) -> Result<ParsedUpload, HttpError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| HttpError::UploadParseFailed(format!("invalid JSON response: {err}")))?;

    if let Some(status_path) = &spec.status_path {
        let actual = get_json_value(&json, status_path);
        let expected = spec.success_value.as_deref().unwrap_or("");
        if actual != expected {
            return Err(HttpError::UploadParseFailed(format!(
                "status at '{status_path}' was '{actual}', expected '{expected}'"
            )));
        }
    }

    let url_path = spec
        .url_path
        .as_deref()
        .ok_or_else(|| HttpError::UploadParseFailed("response parser has no url_path configured".into()))?;
    let image_url = get_json_value(&json, url_path);
    if image_url.is_empty() {
        return Err(HttpError::UploadParseFailed(format!("no value found at '{url_path}'")));
    }

    let thumb_url = spec
        .thumb_path
        .as_deref()
        .map(|path| get_json_value(&json, path))
        .filter(|value| !value.is_empty());

    Ok(ParsedUpload { image_url, thumb_url })
}
