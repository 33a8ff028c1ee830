#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to build a private HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("pre-request chain exceeds the maximum depth")]
    ChainTooDeep,
    #[error("upload response could not be parsed: {0}")]
    UploadParseFailed(String),
    #[error("parser type is not yet supported")]
    UnsupportedParser,
    #[error("failed to build multipart body: {0}")]
    Multipart(#[from] std::io::Error),
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}
