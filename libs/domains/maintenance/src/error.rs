use domain_embeddings::EmbeddingError;
use thiserror::Error;

/// Record-scoped failure; never stops the rest of the batch on its own
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaintenanceError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

/// Batch-level failure; nothing is ingested
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Input source unreadable: {0}")]
    SourceUnreadable(String),
}

impl From<EmbeddingError> for MaintenanceError {
    fn from(err: EmbeddingError) -> Self {
        MaintenanceError::EmbeddingUnavailable(err.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for MaintenanceError {
    fn from(err: mongodb::error::Error) -> Self {
        MaintenanceError::Persistence(err.to_string())
    }
}
