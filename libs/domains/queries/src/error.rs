use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The event does not fit the registered schema
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Schema registry error: {0}")]
    Registry(String),

    /// Bytes are not a valid framed payload for any known schema
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        QueryError::Registry(err.to_string())
    }
}

impl From<core_config::ConfigError> for QueryError {
    fn from(err: core_config::ConfigError) -> Self {
        QueryError::Config(err.to_string())
    }
}
