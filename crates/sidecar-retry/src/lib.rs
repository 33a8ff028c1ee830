#![deny(unreachable_pub)]

//! Retry Engine (§4.3): a generic wrapper around a fallible attempt that
//! classifies failures as retryable or not, and sleeps a jittered
//! exponential backoff between attempts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use sidecar_types::RetryConfig;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

/// Invoked with the 0-indexed attempt number when an attempt succeeds after
/// at least one retry, so a caller with access to the stdout protocol can
/// emit a `log` event recording it (§4.3: "Success after any retry emits a
/// structured log event recording the attempt number").
pub type RetryNotify = Arc<dyn Fn(u32) + Send + Sync>;

/// A failed attempt, as the caller observed it: an HTTP status code when one
/// was available, and the opaque message the underlying call produced.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub status_code: Option<u16>,
    pub message: String,
}

impl AttemptFailure {
    pub fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self { status_code, message: message.into() }
    }
}

#[derive(Debug)]
pub enum RetryError {
    /// All attempts were exhausted; carries the last failure observed.
    Exhausted(AttemptFailure),
    /// The engine gave up on a non-retryable failure.
    NonRetryable(AttemptFailure),
    /// The cancellation token fired while waiting out a backoff sleep.
    Cancelled,
}

impl std::fmt::Display for RetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted(f0) => write!(f, "retries exhausted: {}", f0.message),
            RetryError::NonRetryable(f0) => write!(f, "non-retryable failure: {}", f0.message),
            RetryError::Cancelled => write!(f, "retry wait was cancelled"),
        }
    }
}

impl std::error::Error for RetryError {}

const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "connection refused",
    "connection reset",
    "temporary failure",
    "no such host",
    "network unreachable",
    "broken pipe",
    "i/o timeout",
    "tls handshake timeout",
    "dial failure",
    "eof",
];

static STATUS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([45]\d{2})\b").expect("valid regex"));
static STATUS_CODE_AFTER_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:status code|http )\s*(\d+)").expect("valid regex")
});

/// Status-code extraction from an opaque error string, in priority order:
/// "status code"/"http " followed by digits, then the first bare 4xx/5xx
/// three-digit number. Returns `None` if nothing matches.
pub fn extract_status_code(message: &str) -> Option<u16> {
    if let Some(caps) = STATUS_CODE_AFTER_PHRASE_RE.captures(message) {
        if let Ok(code) = caps[1].parse::<u16>() {
            return Some(code);
        }
    }
    if let Some(caps) = STATUS_CODE_RE.captures(message) {
        if let Ok(code) = caps[1].parse::<u16>() {
            return Some(code);
        }
    }
    None
}

fn matches_transient_pattern(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TRANSIENT_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// A failure is retryable iff its status code (explicit, or extracted from
/// the message) is in the configured retryable set, or its message matches
/// a known transient network pattern.
pub fn is_retryable(failure: &AttemptFailure, cfg: &RetryConfig) -> bool {
    let status = failure.status_code.or_else(|| extract_status_code(&failure.message));
    if let Some(status) = status {
        if cfg.retryable_status_codes.contains(&status) {
            return true;
        }
    }
    matches_transient_pattern(&failure.message)
}

/// Backoff for attempt `n` (1-indexed): `initial * multiplier^n`, capped at
/// `max_backoff_ms`, then scaled by a factor drawn uniformly from [0.8, 1.2]
/// using the OS's cryptographically strong RNG. A predictable jitter source
/// would let synchronized clients thundering-herd a recovering backend.
pub fn backoff_duration(attempt: u32, cfg: &RetryConfig) -> Duration {
    let raw = cfg.initial_backoff_ms as f64 * cfg.backoff_multiplier.powi(attempt as i32);
    let capped = raw.min(cfg.max_backoff_ms as f64).max(0.0);
    let jitter = rand::rngs::OsRng.random_range(0.8f64..1.2f64);
    Duration::from_secs_f64((capped * jitter) / 1000.0)
}

/// Runs `attempt` for up to `cfg.max_retries` additional tries beyond the
/// initial call, sleeping a jittered backoff between tries. `attempt(n)` is
/// called with the 0-indexed attempt number (0 is the original call).
/// `notify`, when given, is called once on a success that followed at least
/// one retry.
pub async fn retry_with_backoff<F, Fut, T>(
    cfg: &RetryConfig,
    cancel: &CancellationToken,
    operation: &str,
    notify: Option<RetryNotify>,
    mut attempt: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let mut last_failure = None;
    for n in 0..=cfg.max_retries {
        match attempt(n).await {
            Ok(value) => {
                if n > 0 {
                    tracing::info!(operation, attempt = n, "succeeded after retry");
                    if let Some(notify) = &notify {
                        notify(n);
                    }
                }
                return Ok(value);
            }
            Err(failure) => {
                if !is_retryable(&failure, cfg) {
                    return Err(RetryError::NonRetryable(failure));
                }
                if n == cfg.max_retries {
                    last_failure = Some(failure);
                    break;
                }
                let wait = backoff_duration(n + 1, cfg);
                tracing::warn!(operation, attempt = n, wait_ms = wait.as_millis() as u64, error = %failure.message, "retrying after backoff");
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                }
                last_failure = Some(failure);
            }
        }
    }
    Err(RetryError::Exhausted(last_failure.expect("loop always records a failure before exiting")))
}
