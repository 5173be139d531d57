use async_trait::async_trait;

use crate::error::MaintenanceResult;
use crate::models::{EmbeddedDocument, UpsertOutcome};

/// Keyed document store for embedded maintenance records
///
/// `upsert` replaces the whole document stored under `key` or inserts it;
/// repeating it with the same document leaves the store unchanged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Insert or replace the document stored under `key`
    async fn upsert(&self, key: &str, document: &EmbeddedDocument) -> MaintenanceResult<UpsertOutcome>;

    /// Get the document stored under `key`
    async fn get(&self, key: &str) -> MaintenanceResult<Option<EmbeddedDocument>>;

    /// Count stored documents
    async fn count(&self) -> MaintenanceResult<u64>;
}
