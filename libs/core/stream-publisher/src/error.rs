//! Publisher error types
//!
//! Only configuration and client-construction problems are returned directly.
//! Everything that happens to an accepted payload is reported through its
//! [`DeliveryOutcome`](crate::DeliveryOutcome).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Broker rejected or failed the message
    #[error("Broker error: {0}")]
    Broker(String),

    /// Local producer queue is full
    #[error("Local producer queue is full")]
    QueueFull,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PublishError {
    /// Whether waiting for in-flight messages may let the same payload through
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::QueueFull)
    }
}

impl From<core_config::ConfigError> for PublishError {
    fn from(err: core_config::ConfigError) -> Self {
        PublishError::Config(err.to_string())
    }
}
