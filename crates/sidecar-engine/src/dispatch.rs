use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sidecar_adapters::{Adapter, AdapterContext, ViperAdapter};
use sidecar_events::EventEmitter;
use sidecar_types::{Action, FileStatus, Job, OutputEvent, ResultPayload, RetryConfig};
use sidecar_validate::validate_job;
use tokio_util::sync::CancellationToken;

use crate::services::Services;
use crate::upload::{run_batch, UploadTarget};

const VIPER_SERVICE: &str = "viper";

/// Validates and runs one job end to end, emitting whatever events its
/// action produces. A validation failure emits a single `error` and the job
/// is otherwise skipped, per §4.10 — it never reaches `batch_complete`.
pub(crate) async fn handle_job<W>(job: Job, services: Arc<Services>, emitter: Arc<EventEmitter<W>>, per_file_timeout: Duration)
where
    W: Write + Send + 'static,
{
    let files = match validate_job(&job).await {
        Ok(files) => files,
        Err(err) => {
            emitter.emit(&OutputEvent::error(None, err.to_string()));
            return;
        }
    };

    let retry_cfg = job.retry_or_default();
    if let Some(rate_limit) = &job.rate_limit {
        services.rate_limiter.update(&job.service, rate_limit).await;
    }

    match job.action {
        Action::Upload => handle_upload(&job, files, services, emitter, retry_cfg, per_file_timeout).await,
        Action::HttpUpload => handle_http_upload(&job, files, services, emitter, retry_cfg, per_file_timeout).await,
        Action::Login => handle_login(&job, &services, &emitter, &retry_cfg).await,
        Action::Verify => handle_verify(&job, &services, &emitter).await,
        Action::ListGalleries => handle_list_galleries(&job, &services, &emitter, &retry_cfg).await,
        Action::CreateGallery => handle_create_gallery(&job, &services, &emitter, &retry_cfg).await,
        Action::FinalizeGallery => handle_finalize_gallery(&job, &services, &emitter, &retry_cfg).await,
        Action::GenerateThumb => handle_generate_thumb(&job, &files, &emitter).await,
        Action::ViperLogin => handle_viper_login(&job, &services, &emitter, &retry_cfg).await,
        Action::ViperPost => handle_viper_post(&job, &services, &emitter, &retry_cfg).await,
    }
}

async fn handle_upload<W>(job: &Job, files: Vec<PathBuf>, services: Arc<Services>, emitter: Arc<EventEmitter<W>>, retry_cfg: RetryConfig, per_file_timeout: Duration)
where
    W: Write + Send + 'static,
{
    match sidecar_adapters::adapter_for(&job.service) {
        Some(adapter) => run_batch(job, files, services, emitter, retry_cfg, per_file_timeout, UploadTarget::Adapter(adapter)).await,
        None => fail_all_files(&files, &emitter, format!("'{}' is not a known image host", job.service)).await,
    }
}

async fn handle_http_upload<W>(job: &Job, files: Vec<PathBuf>, services: Arc<Services>, emitter: Arc<EventEmitter<W>>, retry_cfg: RetryConfig, per_file_timeout: Duration)
where
    W: Write + Send + 'static,
{
    let Some(spec) = job.request.clone() else {
        fail_all_files(&files, &emitter, "http_upload job has no request spec".to_string()).await;
        return;
    };

    let outcome = match &spec.pre_request {
        Some(pre) => match sidecar_http::execute_pre_request(pre, &services.client).await {
            Ok(outcome) => outcome,
            Err(err) => {
                fail_all_files(&files, &emitter, format!("pre-request failed: {err}")).await;
                return;
            }
        },
        None => sidecar_http::PreRequestOutcome { extracted: Default::default(), client: services.client.clone() },
    };

    run_batch(
        job,
        files,
        services,
        emitter,
        retry_cfg,
        per_file_timeout,
        UploadTarget::Http { spec, extracted: outcome.extracted, client: outcome.client },
    )
    .await;
}

async fn fail_all_files<W>(files: &[PathBuf], emitter: &EventEmitter<W>, msg: String)
where
    W: Write + Send,
{
    for file in files {
        let label = file.display().to_string();
        emitter.emit(&OutputEvent::status(label.clone(), FileStatus::Uploading));
        emitter.emit(&OutputEvent::error(Some(label.clone()), msg.clone()));
        emitter.emit(&OutputEvent::status(label, FileStatus::Failed));
    }
    emitter.emit(&OutputEvent::batch_complete());
}

fn job_context<'a>(job: &'a Job, services: &'a Services, retry_cfg: &'a RetryConfig, cancel: &'a CancellationToken) -> AdapterContext<'a> {
    AdapterContext {
        client: &services.client,
        session: &services.session,
        rate_limiter: &services.rate_limiter,
        retry: retry_cfg,
        cancel,
        progress: None,
        retry_log: None,
    }
}

async fn handle_login<W>(job: &Job, services: &Services, emitter: &EventEmitter<W>, retry_cfg: &RetryConfig)
where
    W: Write + Send,
{
    let cancel = CancellationToken::new();
    let result = if job.service.eq_ignore_ascii_case(VIPER_SERVICE) {
        ViperAdapter::new().login(&job_context(job, services, retry_cfg, &cancel), &job.credentials).await.map_err(|e| e.to_string())
    } else {
        match sidecar_adapters::adapter_for(&job.service) {
            Some(adapter) => adapter.login(&job_context(job, services, retry_cfg, &cancel), &job.credentials).await.map_err(|e| e.to_string()),
            None => Err(format!("'{}' is not a known service", job.service)),
        }
    };
    emit_job_result(emitter, result, "login succeeded");
}

/// Read-only: whether the session store already considers this service
/// authenticated. Unlike `login`, this never makes a network call.
async fn handle_verify<W>(job: &Job, services: &Services, emitter: &EventEmitter<W>)
where
    W: Write + Send,
{
    let snapshot = services.session.snapshot(&job.service).await;
    let result = if snapshot.is_authenticated() { Ok(()) } else { Err("not authenticated".to_string()) };
    emit_job_result(emitter, result, "authenticated");
}

async fn handle_list_galleries<W>(job: &Job, services: &Services, emitter: &EventEmitter<W>, retry_cfg: &RetryConfig)
where
    W: Write + Send,
{
    let Some(adapter) = sidecar_adapters::adapter_for(&job.service) else {
        emitter.emit(&OutputEvent::Result(ResultPayload::job_failure(format!("'{}' is not a known service", job.service))));
        return;
    };
    let cancel = CancellationToken::new();
    match adapter.list_galleries(&job_context(job, services, retry_cfg, &cancel), &job.credentials).await {
        Ok(galleries) => {
            let data = serde_json::Value::Array(
                galleries
                    .into_iter()
                    .map(|g| serde_json::json!({"id": g.id, "name": g.name, "url": g.url}))
                    .collect(),
            );
            emitter.emit(&OutputEvent::Data { data });
        }
        Err(err) => emitter.emit(&OutputEvent::Result(ResultPayload::job_failure(err.to_string()))),
    }
}

async fn handle_create_gallery<W>(job: &Job, services: &Services, emitter: &EventEmitter<W>, retry_cfg: &RetryConfig)
where
    W: Write + Send,
{
    let Some(adapter) = sidecar_adapters::adapter_for(&job.service) else {
        emitter.emit(&OutputEvent::Result(ResultPayload::job_failure(format!("'{}' is not a known service", job.service))));
        return;
    };
    let name = job.config_str("gallery_name").unwrap_or_default();
    let cancel = CancellationToken::new();
    let result = adapter.create_gallery(&job_context(job, services, retry_cfg, &cancel), &job.credentials, name).await;
    match result {
        Ok(id) => emitter.emit(&OutputEvent::Result(ResultPayload::job_success("gallery created", Some(serde_json::json!({"gallery_id": id}))))),
        Err(err) => emitter.emit(&OutputEvent::Result(ResultPayload::job_failure(err.to_string()))),
    }
}

async fn handle_finalize_gallery<W>(job: &Job, services: &Services, emitter: &EventEmitter<W>, retry_cfg: &RetryConfig)
where
    W: Write + Send,
{
    let Some(adapter) = sidecar_adapters::adapter_for(&job.service) else {
        emitter.emit(&OutputEvent::Result(ResultPayload::job_failure(format!("'{}' is not a known service", job.service))));
        return;
    };
    let gallery_id = job.config_str("gallery_id").unwrap_or_default();
    let cancel = CancellationToken::new();
    let result = adapter.finalize_gallery(&job_context(job, services, retry_cfg, &cancel), gallery_id).await.map_err(|e| e.to_string());
    emit_job_result(emitter, result, "gallery finalized");
}

async fn handle_generate_thumb<W>(job: &Job, files: &[PathBuf], emitter: &EventEmitter<W>)
where
    W: Write + Send,
{
    let Some(path) = files.first() else {
        emitter.emit(&OutputEvent::error(None, "generate_thumb job has no file"));
        return;
    };
    let width = job.config_str("thumb_width").and_then(|s| s.parse::<u32>().ok());
    match sidecar_thumbnail::generate_thumbnail_base64(path, width).await {
        Ok(encoded) => emitter.emit(&OutputEvent::Data { data: serde_json::Value::String(encoded) }),
        Err(err) => emitter.emit(&OutputEvent::error(Some(path.display().to_string()), err.to_string())),
    }
}

async fn handle_viper_login<W>(job: &Job, services: &Services, emitter: &EventEmitter<W>, retry_cfg: &RetryConfig)
where
    W: Write + Send,
{
    let cancel = CancellationToken::new();
    let result = ViperAdapter::new().login(&job_context(job, services, retry_cfg, &cancel), &job.credentials).await.map_err(|e| e.to_string());
    emit_job_result(emitter, result, "login succeeded");
}

async fn handle_viper_post<W>(job: &Job, services: &Services, emitter: &EventEmitter<W>, retry_cfg: &RetryConfig)
where
    W: Write + Send,
{
    let thread_id = job.config_str("thread_id").unwrap_or_default();
    let message = job.config_str("message").unwrap_or_default();
    let cancel = CancellationToken::new();
    let result = ViperAdapter::new()
        .post(&job_context(job, services, retry_cfg, &cancel), &job.credentials, thread_id, message)
        .await
        .map_err(|e| e.to_string());
    emit_job_result(emitter, result, "post submitted");
}

fn emit_job_result<W>(emitter: &EventEmitter<W>, result: Result<(), String>, success_msg: &str)
where
    W: Write + Send,
{
    match result {
        Ok(()) => emitter.emit(&OutputEvent::Result(ResultPayload::job_success(success_msg, None))),
        Err(msg) => emitter.emit(&OutputEvent::Result(ResultPayload::job_failure(msg))),
    }
}
