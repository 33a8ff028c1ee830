#![deny(unreachable_pub)]

//! Streaming Multipart Body (§4.4): upload bodies are produced lazily by a
//! task that feeds chunks into the HTTP request as they're read from disk,
//! keeping peak memory bounded regardless of file size. The file part of
//! the body is wrapped in a progress tracker that reports at most once
//! every two seconds.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::StreamExt;
use sidecar_types::ProgressData;
use tokio_util::io::ReaderStream;

const PROGRESS_EMIT_INTERVAL: Duration = Duration::from_secs(2);

/// Invoked with the file path and its current progress snapshot. Must not
/// block: a slow sink should not slow the upload, so callers wire this to
/// something that returns quickly (e.g. the stdout event emitter, which is
/// a mutex-guarded write).
pub type ProgressCallback = Arc<dyn Fn(&str, ProgressData) + Send + Sync>;

struct ProgressTracker {
    file: String,
    total_bytes: u64,
    transferred: AtomicU64,
    started: Instant,
    last_emit: Mutex<Instant>,
    callback: ProgressCallback,
}

impl ProgressTracker {
    fn new(file: String, total_bytes: u64, callback: ProgressCallback) -> Self {
        Self {
            file,
            total_bytes,
            transferred: AtomicU64::new(0),
            started: Instant::now(),
            last_emit: Mutex::new(Instant::now() - PROGRESS_EMIT_INTERVAL),
            callback,
        }
    }

    fn record(&self, chunk_len: u64) {
        let transferred = (self.transferred.fetch_add(chunk_len, Ordering::SeqCst) + chunk_len)
            .min(self.total_bytes);

        let mut last_emit = self.last_emit.lock().unwrap_or_else(|p| p.into_inner());
        if last_emit.elapsed() < PROGRESS_EMIT_INTERVAL {
            return;
        }
        *last_emit = Instant::now();
        drop(last_emit);

        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 { transferred as f64 / elapsed } else { 0.0 };
        let eta_seconds = if speed > 0.0 {
            (self.total_bytes.saturating_sub(transferred)) as f64 / speed
        } else {
            0.0
        };
        let percentage = if self.total_bytes > 0 {
            (transferred as f64 / self.total_bytes as f64) * 100.0
        } else {
            100.0
        };

        (self.callback)(
            &self.file,
            ProgressData { bytes_transferred: transferred, total_bytes: self.total_bytes, speed, percentage, eta_seconds },
        );
    }
}

/// A field value that has already been resolved (text literal, or a path to
/// a file on disk) and is ready to be wired into a multipart form.
pub enum ResolvedField {
    Text { name: String, value: String },
    File { name: String, path: PathBuf, filename: String, content_type: Option<String> },
}

/// Wraps a file at `path` in a progress-tracked byte stream and returns it
/// as a `reqwest` multipart part with the given field filename/content type.
pub async fn progress_tracked_file_part(
    path: &std::path::Path,
    filename: &str,
    content_type: Option<&str>,
    progress: Option<ProgressCallback>,
) -> std::io::Result<reqwest::multipart::Part> {
    let file = tokio::fs::File::open(path).await?;
    let total_bytes = file.metadata().await?.len();
    let tracker = progress.map(|callback| {
        Arc::new(ProgressTracker::new(path.display().to_string(), total_bytes, callback))
    });

    let stream = ReaderStream::new(file).map(move |chunk| {
        if let (Ok(bytes), Some(tracker)) = (&chunk, tracker.as_ref()) {
            tracker.record(bytes.len() as u64);
        }
        chunk
    });

    let body = reqwest::Body::wrap_stream(stream);
    let mut part = reqwest::multipart::Part::stream_with_length(body, total_bytes)
        .file_name(filename.to_string());
    if let Some(content_type) = content_type {
        part = part
            .mime_str(content_type)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    }
    Ok(part)
}

/// Assembles resolved fields into a `reqwest` multipart form, streaming any
/// file fields through [`progress_tracked_file_part`].
pub async fn build_multipart_form(
    fields: Vec<ResolvedField>,
    progress: Option<ProgressCallback>,
) -> std::io::Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match field {
            ResolvedField::Text { name, value } => form.text(name, value),
            ResolvedField::File { name, path, filename, content_type } => {
                let part =
                    progress_tracked_file_part(&path, &filename, content_type.as_deref(), progress.clone())
                        .await?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn progress_never_exceeds_total_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let payload = vec![7u8; 64 * 1024];
        file.write_all(&payload).unwrap();
        file.flush().unwrap();

        let seen: Arc<StdMutex<Vec<ProgressData>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback: ProgressCallback = Arc::new(move |_file, data| {
            seen_clone.lock().unwrap().push(data);
        });

        let _part = progress_tracked_file_part(file.path(), "a.jpg", Some("image/jpeg"), Some(callback))
            .await
            .unwrap();

        for data in seen.lock().unwrap().iter() {
            assert!(data.bytes_transferred <= data.total_bytes);
        }
    }

    #[tokio::test]
    async fn form_with_no_progress_callback_still_builds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        file.flush().unwrap();

        let fields = vec![
            ResolvedField::Text { name: "title".into(), value: "hi".into() },
            ResolvedField::File {
                name: "file".into(),
                path: file.path().to_path_buf(),
                filename: "hello.txt".into(),
                content_type: Some("text/plain".into()),
            },
        ];
        build_multipart_form(fields, None).await.unwrap();
    }

    #[test]
    fn eta_is_zero_when_speed_is_zero() {
        let seen: Arc<StdMutex<Option<ProgressData>>> = Arc::new(StdMutex::new(None));
        let seen_clone = seen.clone();
        let callback: ProgressCallback = Arc::new(move |_file, data| {
            *seen_clone.lock().unwrap() = Some(data);
        });
        let tracker = ProgressTracker::new("f".into(), 100, callback);
        tracker.record(0);
        let data = seen.lock().unwrap().clone().expect("constructor backdates last_emit so this fires");
        assert_eq!(data.eta_seconds, 0.0);
        assert_eq!(data.speed, 0.0);
    }
}
