use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sidecar_adapters::{Adapter, AdapterContext};
use sidecar_events::EventEmitter;
use sidecar_multipart::ProgressCallback;
use sidecar_retry::{retry_with_backoff, AttemptFailure, RetryNotify};
use sidecar_types::{FileStatus, HttpRequestSpec, Job, OutputEvent, ResultPayload, RetryConfig};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::services::Services;

/// What a file in an `upload` or `http_upload` job is routed through.
pub(crate) enum UploadTarget {
    Adapter(Arc<dyn Adapter>),
    Http { spec: HttpRequestSpec, extracted: HashMap<String, String>, client: reqwest::Client },
}

enum FileOutcome {
    Success { url: String, thumb: Option<String> },
    Failed(String),
    TimedOut,
}

/// Fans a job's file list out over `job.threads()` concurrent slots (§4.9),
/// each file wrapped in its own `per_file_timeout` deadline that is
/// independent of process shutdown (§5). Emits the ordered per-file event
/// sequence and a trailing `batch_complete` once every file has reached a
/// terminal state.
pub(crate) async fn run_batch<W>(
    job: &Job,
    files: Vec<PathBuf>,
    services: Arc<Services>,
    emitter: Arc<EventEmitter<W>>,
    retry_cfg: RetryConfig,
    per_file_timeout: Duration,
    target: UploadTarget,
) where
    W: Write + Send + 'static,
{
    let permits = Arc::new(Semaphore::new(job.threads()));
    let target = Arc::new(target);
    let credentials = Arc::new(job.credentials.clone());
    let service = Arc::new(job.service.clone());
    let mut tasks = JoinSet::new();

    for file in files {
        let permits = permits.clone();
        let services = services.clone();
        let emitter = emitter.clone();
        let retry_cfg = retry_cfg.clone();
        let target = target.clone();
        let credentials = credentials.clone();
        let service = service.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.expect("batch semaphore is never closed");
            process_one_file(file, services, emitter, retry_cfg, per_file_timeout, target, credentials, service).await;
        });
    }

    while tasks.join_next().await.is_some() {}
    emitter.emit(&OutputEvent::batch_complete());
}

#[allow(clippy::too_many_arguments)]
async fn process_one_file<W>(
    file: PathBuf,
    services: Arc<Services>,
    emitter: Arc<EventEmitter<W>>,
    retry_cfg: RetryConfig,
    per_file_timeout: Duration,
    target: Arc<UploadTarget>,
    credentials: Arc<HashMap<String, String>>,
    service: Arc<String>,
) where
    W: Write + Send + 'static,
{
    let label = file.display().to_string();
    emitter.emit(&OutputEvent::status(label.clone(), FileStatus::Uploading));

    let progress_emitter = emitter.clone();
    let progress_label = label.clone();
    let progress: ProgressCallback = Arc::new(move |_file, data| {
        progress_emitter.emit(&OutputEvent::Progress { file: progress_label.clone(), data });
    });

    let retry_log_emitter = emitter.clone();
    let retry_log_label = label.clone();
    let retry_log: RetryNotify = Arc::new(move |attempt| {
        retry_log_emitter.emit(&OutputEvent::log(format!("{retry_log_label}: succeeded after retry (attempt {})", attempt + 1)));
    });

    // The deadline only cancels this file's own attempt; it is never tied
    // to process-wide shutdown, which lets in-flight work expire on its own
    // schedule instead (§5).
    let deadline = CancellationToken::new();
    let timer_token = deadline.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(per_file_timeout).await;
        timer_token.cancel();
    });

    let outcome = tokio::select! {
        _ = deadline.cancelled() => FileOutcome::TimedOut,
        result = upload_one(&target, &services, &retry_cfg, &service, &file, &deadline, progress, retry_log, &credentials) => {
            match result {
                Ok((url, thumb)) => FileOutcome::Success { url, thumb },
                Err(msg) => FileOutcome::Failed(msg),
            }
        }
    };
    timer.abort();

    match outcome {
        FileOutcome::Success { url, thumb } => {
            emitter.emit(&OutputEvent::Result(ResultPayload::upload_success(label.clone(), url, thumb.unwrap_or_default())));
            emitter.emit(&OutputEvent::status(label, FileStatus::Done));
        }
        FileOutcome::Failed(msg) => {
            emitter.emit(&OutputEvent::error(Some(label.clone()), msg));
            emitter.emit(&OutputEvent::status(label, FileStatus::Failed));
        }
        FileOutcome::TimedOut => {
            emitter.emit(&OutputEvent::error(Some(label.clone()), "Upload timed out"));
            emitter.emit(&OutputEvent::status(label, FileStatus::Timeout));
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn upload_one(
    target: &UploadTarget,
    services: &Services,
    retry_cfg: &RetryConfig,
    service: &str,
    file: &Path,
    cancel: &CancellationToken,
    progress: ProgressCallback,
    retry_log: RetryNotify,
    credentials: &HashMap<String, String>,
) -> Result<(String, Option<String>), String> {
    match target {
        UploadTarget::Adapter(adapter) => {
            let ctx = AdapterContext {
                client: &services.client,
                session: &services.session,
                rate_limiter: &services.rate_limiter,
                retry: retry_cfg,
                cancel,
                progress: Some(progress),
                retry_log: Some(retry_log),
            };
            adapter.upload(&ctx, credentials, file).await.map(|pair| (pair.image_url, pair.thumb_url)).map_err(|e| e.to_string())
        }
        UploadTarget::Http { spec, extracted, client } => {
            if !service.is_empty() {
                services.rate_limiter.wait(service, cancel).await.map_err(|e| e.to_string())?;
            }
            let operation = format!("{service}:http_upload");
            let parsed = retry_with_backoff(retry_cfg, cancel, &operation, Some(retry_log), |_attempt| {
                let spec = spec.clone();
                let file = file.to_path_buf();
                let client = client.clone();
                let extracted = extracted.clone();
                let progress = progress.clone();
                async move {
                    let response = sidecar_http::send_upload_request(&spec, &file, &client, &extracted, Some(progress))
                        .await
                        .map_err(|err| AttemptFailure::new(None, err.to_string()))?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(AttemptFailure::new(Some(status.as_u16()), format!("upload returned HTTP {status}")));
                    }
                    sidecar_http::parse_upload_response(&spec.response, response).await.map_err(|err| AttemptFailure::new(None, err.to_string()))
                }
            })
            .await
            .map_err(|e| e.to_string())?;
            Ok((parsed.image_url, parsed.thumb_url))
        }
    }
}
