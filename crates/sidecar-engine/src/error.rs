#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to build shared http client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}
