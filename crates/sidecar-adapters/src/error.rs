#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("upload response did not contain a recoverable URL")]
    UploadParseFailed,
    #[error("gallery operation failed: {0}")]
    GalleryFailed(String),
    #[error("forum post failed: {0}")]
    PostFailed(String),
    #[error("this service does not support that operation")]
    NotSupported,
    #[error("rate limiter wait was cancelled")]
    RateLimited(#[from] sidecar_ratelimit::RateLimitError),
    #[error("session login failed: {0}")]
    Session(#[from] sidecar_session::SessionError),
    #[error("{0}")]
    Retry(#[from] sidecar_retry::RetryError),
    #[error("failed to build multipart body: {0}")]
    Io(#[from] std::io::Error),
}
