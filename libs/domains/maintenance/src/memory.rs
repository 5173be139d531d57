//! In-memory document sink
//!
//! Same replace-or-insert semantics as the MongoDB sink; used for dry runs and
//! tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{MaintenanceError, MaintenanceResult};
use crate::models::{EmbeddedDocument, UpsertOutcome};
use crate::repository::DocumentSink;

#[derive(Default)]
pub struct InMemoryDocumentSink {
    documents: RwLock<HashMap<String, EmbeddedDocument>>,
}

impl InMemoryDocumentSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored documents, ordered by key
    pub async fn documents(&self) -> Vec<EmbeddedDocument> {
        let mut documents: Vec<_> = self.documents.read().await.values().cloned().collect();
        documents.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        documents
    }
}

#[async_trait]
impl DocumentSink for InMemoryDocumentSink {
    async fn upsert(&self, key: &str, document: &EmbeddedDocument) -> MaintenanceResult<UpsertOutcome> {
        if key != document.record_id {
            return Err(MaintenanceError::Persistence(format!(
                "key '{key}' does not match record_id '{}'",
                document.record_id
            )));
        }

        let previous = self
            .documents
            .write()
            .await
            .insert(key.to_string(), document.clone());

        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }

    async fn get(&self, key: &str) -> MaintenanceResult<Option<EmbeddedDocument>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn count(&self) -> MaintenanceResult<u64> {
        Ok(self.documents.read().await.len() as u64)
    }
}
