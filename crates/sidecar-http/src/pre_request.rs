use std::collections::HashMap;
use std::time::Duration;

use sidecar_types::{PreRequestResponseType, PreRequestSpec, MAX_PRE_REQUEST_CHAIN_DEPTH};

use crate::error::HttpError;
use crate::html_extract::extract_html_value;
use crate::json_path::get_json_value;
use crate::method::parse_method;

const PRIVATE_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// What a Pre-Request chain produced: the accumulated extraction map, and
/// the client the chain ran on (fresh and cookie-bearing, or the shared
/// process-wide client), which the caller reuses for the upload itself.
pub struct PreRequestOutcome {
    pub extracted: HashMap<String, String>,
    pub client: reqwest::Client,
}

/// Executes a Pre-Request Spec, recursing through `follow_up_request`. The
/// decision to use a private cookie jar is made once, from the top spec's
/// `use_cookies`; every link in the chain runs on that same client.
pub async fn execute_pre_request(
    spec: &PreRequestSpec,
    shared_client: &reqwest::Client,
) -> Result<PreRequestOutcome, HttpError> {
    if spec.chain_len() > MAX_PRE_REQUEST_CHAIN_DEPTH {
        return Err(HttpError::ChainTooDeep);
    }

    let client = if spec.use_cookies {
        reqwest::Client::builder()
            .cookie_store(true)
            .timeout(PRIVATE_CLIENT_TIMEOUT)
            .build()
            .map_err(HttpError::ClientBuild)?
    } else {
        shared_client.clone()
    };

    let mut extracted = HashMap::new();
    execute_chain_link(spec, &client, 0, &mut extracted).await?;
    Ok(PreRequestOutcome { extracted, client })
}

fn execute_chain_link<'a>(
    spec: &'a PreRequestSpec,
    client: &'a reqwest::Client,
    depth: usize,
    extracted: &'a mut HashMap<String, String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), HttpError>> + Send + 'a>> {
    Box::pin(async move {
        if depth >= MAX_PRE_REQUEST_CHAIN_DEPTH {
            return Err(HttpError::ChainTooDeep);
        }

        let method = parse_method(&spec.method)?;
        let mut request = client.request(method, &spec.url);
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }
        if !spec.form_fields.is_empty() {
            request = request.form(&spec.form_fields);
        }

        tracing::debug!(url = %spec.url, depth, "executing pre-request link");
        let response = request.send().await?;
        let body = response.text().await?;

        for (key, path) in &spec.extract {
            let value = match spec.response_type {
                PreRequestResponseType::Json => {
                    let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
                    get_json_value(&json, path)
                }
                PreRequestResponseType::Html => extract_html_value(&body, path),
            };
            extracted.insert(key.clone(), value);
        }

        if let Some(follow_up) = &spec.follow_up_request {
            execute_chain_link(follow_up, client, depth + 1, extracted).await?;
        }
        Ok(())
    })
}
