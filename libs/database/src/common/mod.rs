//! Common utilities shared by the connectors and by callers that retry remote calls

pub mod retry;

pub use retry::{RetryConfig, retry, retry_if, retry_with_backoff};
