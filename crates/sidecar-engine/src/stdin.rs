use std::io::Write;

use sidecar_events::EventEmitter;
use sidecar_types::{Job, OutputEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Reads newline-delimited JSON jobs from `reader` and forwards each to
/// `job_tx`. A malformed line produces an `error` event and decoding
/// resumes on the next line (§6, §8). Returns when the reader hits EOF or
/// the job channel's receiver has been dropped.
pub async fn run_stdin_decoder<R, W>(mut reader: R, job_tx: mpsc::Sender<Job>, emitter: &EventEmitter<W>)
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                emitter.emit(&OutputEvent::error(None, format!("stdin read error: {err}")));
                break;
            }
        };
        let _ = read;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Job>(trimmed) {
            Ok(job) => {
                if job_tx.send(job).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                emitter.emit(&OutputEvent::error(None, format!("malformed job line: {err}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_types::Action;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<Mutex<Vec<u8>>>);
    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn malformed_line_emits_error_and_decoding_continues() {
        let input = "not json\n{\"action\":\"verify\",\"service\":\"imgbb\"}\n";
        let buf = SharedBuf::default();
        let emitter = EventEmitter::new(buf.clone());
        let (tx, mut rx) = mpsc::channel(8);

        run_stdin_decoder(input.as_bytes(), tx, &emitter).await;

        let job = rx.recv().await.expect("valid job after the malformed line");
        assert_eq!(job.action, Action::Verify);
        assert!(rx.recv().await.is_none());

        let log = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("malformed job line"));
    }

    #[tokio::test]
    async fn blank_lines_are_skipped_without_error() {
        let input = "\n\n{\"action\":\"verify\",\"service\":\"imgbb\"}\n";
        let buf = SharedBuf::default();
        let emitter = EventEmitter::new(buf.clone());
        let (tx, mut rx) = mpsc::channel(8);

        run_stdin_decoder(input.as_bytes(), tx, &emitter).await;

        assert!(rx.recv().await.is_some());
        let log = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(log.is_empty());
    }
}
