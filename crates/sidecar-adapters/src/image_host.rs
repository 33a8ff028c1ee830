use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use sidecar_retry::{retry_with_backoff, AttemptFailure};

use crate::adapter::{Adapter, AdapterContext};
use crate::error::AdapterError;
use crate::extract::{dedup_galleries, extract_gallery_id, extract_upload_urls};
use crate::types::{GalleryDescriptor, HostRecipe, SuccessMarker, UrlPair};

/// Generic image-host adapter, configured by a [`HostRecipe`]. Each
/// concrete host in [`crate::hosts`] is this struct wired to its own
/// recipe — the per-host knowledge lives in the recipe's constants, the
/// state machine is shared.
pub struct ImageHostAdapter {
    recipe: HostRecipe,
}

impl ImageHostAdapter {
    pub fn new(recipe: HostRecipe) -> Self {
        Self { recipe }
    }

    async fn do_login(&self, ctx: &AdapterContext<'_>, username: String, password: String) -> Result<(), AdapterError> {
        let recipe = self.recipe.clone();
        let client = ctx.client.clone();
        ctx.session
            .login_if_needed(recipe.service, move |mut session| async move {
                let mut form = HashMap::new();
                form.insert(recipe.username_field.to_string(), username);
                form.insert(recipe.password_field.to_string(), password);

                let response = client.post(recipe.login_url).form(&form).send().await.map_err(|e| e.to_string())?;
                let final_url = response.url().to_string();
                let body = response.text().await.map_err(|e| e.to_string())?;

                let succeeded = match &recipe.login_success {
                    SuccessMarker::RedirectContains(marker) => final_url.contains(marker),
                    SuccessMarker::BodyContains(marker) => body.contains(marker),
                    SuccessMarker::JsonTokenPath(path) => {
                        let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
                        !sidecar_http::get_json_value(&json, path).is_empty()
                    }
                };
                if !succeeded {
                    tracing::debug!(service = recipe.service, "login was not accepted");
                    return Err(format!("{} login was not accepted", recipe.service));
                }

                tracing::debug!(service = recipe.service, "login accepted");
                session.session_id = Some(final_url);
                Ok(session)
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Adapter for ImageHostAdapter {
    fn service(&self) -> &'static str {
        self.recipe.service
    }

    async fn login(&self, ctx: &AdapterContext<'_>, credentials: &HashMap<String, String>) -> Result<(), AdapterError> {
        let username = credentials.get("username").cloned().unwrap_or_default();
        let password = credentials.get("password").cloned().unwrap_or_default();
        self.do_login(ctx, username, password).await
    }

    async fn upload(
        &self,
        ctx: &AdapterContext<'_>,
        credentials: &HashMap<String, String>,
        file: &Path,
    ) -> Result<UrlPair, AdapterError> {
        if self.recipe.requires_login && !credentials.is_empty() {
            self.login(ctx, credentials).await?;
        } else {
            tracing::debug!(service = self.recipe.service, "uploading anonymously, skipping login");
        }
        ctx.rate_limiter.wait(self.recipe.service, ctx.cancel).await?;

        let recipe = self.recipe.clone();
        let client = ctx.client.clone();
        let progress = ctx.progress.clone();
        let file = file.to_path_buf();
        let operation = format!("{}:upload", recipe.service);
        tracing::debug!(service = recipe.service, file = %file.display(), "starting upload");

        let body = retry_with_backoff(ctx.retry, ctx.cancel, &operation, ctx.retry_log.clone(), |_attempt| {
            let recipe = recipe.clone();
            let client = client.clone();
            let progress = progress.clone();
            let file = file.clone();
            async move {
                let filename = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                let part = sidecar_multipart::progress_tracked_file_part(&file, &filename, None, progress)
                    .await
                    .map_err(|err| AttemptFailure::new(None, err.to_string()))?;
                let form = reqwest::multipart::Form::new().part(recipe.file_field, part);

                let response = client
                    .post(recipe.upload_url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|err| AttemptFailure::new(err.status().map(|s| s.as_u16()), err.to_string()))?;
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|err| AttemptFailure::new(None, err.to_string()))?;
                if !status.is_success() {
                    return Err(AttemptFailure::new(Some(status.as_u16()), format!("upload returned HTTP {status}")));
                }
                Ok(body)
            }
        })
        .await?;

        extract_upload_urls(&body, recipe.image_url_path, recipe.thumb_url_path).ok_or(AdapterError::UploadParseFailed)
    }

    async fn list_galleries(
        &self,
        ctx: &AdapterContext<'_>,
        credentials: &HashMap<String, String>,
    ) -> Result<Vec<GalleryDescriptor>, AdapterError> {
        let url = self.recipe.galleries_url.ok_or(AdapterError::NotSupported)?;
        self.login(ctx, credentials).await?;

        let body = ctx.client.get(url).send().await?.text().await?;
        let document = scraper::Html::parse_document(&body);
        let link_selector = scraper::Selector::parse("a[href*='gallery']").expect("valid selector");
        let id_re = Regex::new(r"gallery[/=](\w+)").expect("valid regex");

        let galleries = document
            .select(&link_selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                let id = id_re.captures(href)?.get(1)?.as_str().to_string();
                let name = el.text().collect::<String>().trim().to_string();
                Some(GalleryDescriptor {
                    id,
                    name: (!name.is_empty()).then_some(name),
                    url: Some(href.to_string()),
                })
            })
            .collect();

        Ok(dedup_galleries(galleries))
    }

    async fn create_gallery(
        &self,
        ctx: &AdapterContext<'_>,
        credentials: &HashMap<String, String>,
        name: &str,
    ) -> Result<String, AdapterError> {
        let url = self.recipe.create_gallery_url.ok_or(AdapterError::NotSupported)?;
        self.login(ctx, credentials).await?;

        let mut form = HashMap::new();
        form.insert("name", name);
        let response = ctx.client.post(url).form(&form).send().await?;
        let final_url = response.url().to_string();
        let body = response.text().await?;

        let manage_link_re = Regex::new(r#"manage[/=](\w+)"#).expect("valid regex");
        extract_gallery_id(&final_url, &body, "gallery_id", &manage_link_re)
            .ok_or_else(|| AdapterError::GalleryFailed(format!("no gallery id recoverable, final url was {final_url}")))
    }

    async fn finalize_gallery(&self, ctx: &AdapterContext<'_>, gallery_id: &str) -> Result<(), AdapterError> {
        if !self.recipe.requires_finalize {
            return Ok(());
        }
        let url = self.recipe.create_gallery_url.ok_or(AdapterError::NotSupported)?;
        let finalize_url = format!("{url}/{gallery_id}/finalize");
        let response = ctx
            .client
            .patch(&finalize_url)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AdapterError::GalleryFailed(format!(
                "finalize returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}
