use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use sidecar_events::EventEmitter;
use sidecar_types::{Job, OutputEvent};
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::dispatch::handle_job;
use crate::error::EngineError;
use crate::services::Services;
use crate::stdin::run_stdin_decoder;

/// Runs the sidecar end to end (§4.9): spawns `config.workers` workers that
/// drain a bounded job queue fed by decoding `reader`, until stdin hits EOF
/// or a shutdown signal arrives. Shutdown only closes the job intake — it
/// does not cancel any in-flight call, which is left to expire against its
/// own per-file deadline (§5).
pub async fn run<R, W>(reader: R, emitter: Arc<EventEmitter<W>>, config: EngineConfig) -> Result<(), EngineError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: Write + Send + 'static,
{
    let services = Arc::new(Services::build()?);
    let (job_tx, job_rx) = mpsc::channel::<Job>(config.channel_capacity);
    let job_rx = Arc::new(Mutex::new(job_rx));

    tracing::info!(workers = config.workers, channel_capacity = config.channel_capacity, "engine starting");

    let mut workers = JoinSet::new();
    for _ in 0..config.workers {
        let job_rx = job_rx.clone();
        let services = services.clone();
        let emitter = emitter.clone();
        let per_file_timeout = config.per_file_timeout;
        workers.spawn(run_worker(job_rx, services, emitter, per_file_timeout));
    }

    let decoder_emitter = emitter.clone();
    let mut decoder = tokio::spawn(async move {
        run_stdin_decoder(reader, job_tx, &decoder_emitter).await;
    });

    tokio::select! {
        _ = shutdown_signal() => {
            emitter.emit(&OutputEvent::log("shutdown signal received, closing job intake"));
            decoder.abort();
        }
        _ = &mut decoder => {
            emitter.emit(&OutputEvent::log("stdin closed, draining in-flight jobs"));
        }
    }

    while workers.join_next().await.is_some() {}
    tracing::info!("engine shutdown complete");
    emitter.emit(&OutputEvent::log("shutdown complete"));
    Ok(())
}

/// One worker's loop: pull a job, run it behind a panic guard, repeat. A
/// panic inside a job's handling is caught and reported as an error event;
/// the worker moves on to the next job rather than dying (§7).
async fn run_worker<W>(
    job_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    services: Arc<Services>,
    emitter: Arc<EventEmitter<W>>,
    per_file_timeout: std::time::Duration,
) where
    W: Write + Send + 'static,
{
    loop {
        let job = job_rx.lock().await.recv().await;
        let Some(job) = job else { break };

        let handling = AssertUnwindSafe(handle_job(job, services.clone(), emitter.clone(), per_file_timeout)).catch_unwind();
        if let Err(panic) = handling.await {
            let message = panic_message(&panic);
            tracing::error!(panic = %message, "worker caught a panic while handling a job");
            emitter.emit(&OutputEvent::error(None, format!("worker panicked: {message}")));
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing a SIGTERM handler should not fail");
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<StdMutex<Vec<u8>>>);
    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn parsed_lines(buf: &SharedBuf) -> Vec<serde_json::Value> {
        String::from_utf8(buf.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn unknown_upload_service_reports_a_failure_and_batch_complete() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let input = format!(
            "{{\"action\":\"upload\",\"service\":\"not-a-host\",\"files\":[{:?}]}}\n",
            file.path().to_str().unwrap()
        );
        let buf = SharedBuf::default();
        let emitter = Arc::new(EventEmitter::new(buf.clone()));

        run(input.as_bytes(), emitter, EngineConfig::new(1)).await.unwrap();

        let events = parsed_lines(&buf);
        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert!(types.contains(&"error"));
        assert!(types.contains(&"batch_complete"));
        let failed_status = events.iter().any(|e| e["type"] == "status" && e["status"] == "failed");
        assert!(failed_status);
    }

    #[tokio::test]
    async fn validation_failure_emits_a_single_error_and_no_batch_complete() {
        let input = "{\"action\":\"upload\",\"service\":\"imgbb.com\",\"files\":[\"/tmp/does-not-exist-at-all.jpg\"]}\n";
        let buf = SharedBuf::default();
        let emitter = Arc::new(EventEmitter::new(buf.clone()));

        run(input.as_bytes(), emitter, EngineConfig::new(1)).await.unwrap();

        let events = parsed_lines(&buf);
        let result_or_status: Vec<_> = events.iter().filter(|e| e["type"] != "log").collect();
        assert_eq!(result_or_status.len(), 1);
        assert_eq!(result_or_status[0]["type"], "error");
    }

    #[tokio::test]
    async fn generate_thumb_on_undecodable_bytes_reports_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an image").unwrap();
        file.flush().unwrap();
        let input = format!("{{\"action\":\"generate_thumb\",\"files\":[{:?}]}}\n", file.path().to_str().unwrap());
        let buf = SharedBuf::default();
        let emitter = Arc::new(EventEmitter::new(buf.clone()));

        run(input.as_bytes(), emitter, EngineConfig::new(1)).await.unwrap();

        let events = parsed_lines(&buf);
        assert!(events.iter().any(|e| e["type"] == "error"));
    }

    #[tokio::test]
    async fn verify_without_a_prior_login_reports_not_authenticated() {
        let input = "{\"action\":\"verify\",\"service\":\"imgbb.com\"}\n";
        let buf = SharedBuf::default();
        let emitter = Arc::new(EventEmitter::new(buf.clone()));

        run(input.as_bytes(), emitter, EngineConfig::new(1)).await.unwrap();

        let events = parsed_lines(&buf);
        let result = events.iter().find(|e| e["type"] == "result").expect("a result event");
        assert_eq!(result["status"], "failed");
    }
}
