use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbeddingError {
    /// Any transport, service or response failure of the remote call
    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Unavailable(err.to_string())
    }
}

impl From<core_config::ConfigError> for EmbeddingError {
    fn from(err: core_config::ConfigError) -> Self {
        EmbeddingError::Config(err.to_string())
    }
}
