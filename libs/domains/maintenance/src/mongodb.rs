//! MongoDB implementation of DocumentSink

use async_trait::async_trait;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tracing::{debug, info, instrument};

use crate::error::{MaintenanceError, MaintenanceResult};
use crate::models::{EmbeddedDocument, UpsertOutcome};
use crate::repository::DocumentSink;

pub const DEFAULT_COLLECTION: &str = "maintenance_logs";

/// MongoDB implementation of the DocumentSink
pub struct MongoDocumentSink {
    collection: Collection<EmbeddedDocument>,
}

impl MongoDocumentSink {
    /// Sink over the `maintenance_logs` collection
    ///
    /// # Example
    /// ```ignore
    /// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
    /// let sink = MongoDocumentSink::new(client.database("maintenance"));
    /// sink.ensure_indexes().await?;
    /// ```
    pub fn new(db: Database) -> Self {
        Self::with_collection(db, DEFAULT_COLLECTION)
    }

    pub fn with_collection(db: Database, collection_name: &str) -> Self {
        let collection = db.collection::<EmbeddedDocument>(collection_name);
        Self { collection }
    }

    pub fn collection(&self) -> &Collection<EmbeddedDocument> {
        &self.collection
    }

    fn key_filter(key: &str) -> Document {
        doc! { "record_id": key }
    }

    /// Create the unique `record_id` index
    #[instrument(skip(self), fields(collection = %self.collection.name()))]
    pub async fn ensure_indexes(&self) -> MaintenanceResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "record_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("record_id_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(index).await?;
        info!("Ensured unique index on record_id");
        Ok(())
    }
}

#[async_trait]
impl DocumentSink for MongoDocumentSink {
    #[instrument(skip(self, document))]
    async fn upsert(&self, key: &str, document: &EmbeddedDocument) -> MaintenanceResult<UpsertOutcome> {
        if key != document.record_id {
            return Err(MaintenanceError::Persistence(format!(
                "key '{key}' does not match record_id '{}'",
                document.record_id
            )));
        }

        let result = self
            .collection
            .replace_one(Self::key_filter(key), document)
            .upsert(true)
            .await?;

        let outcome = if result.upserted_id.is_some() {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        };

        debug!(record_id = %key, %outcome, matched = result.matched_count, "Document upserted");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> MaintenanceResult<Option<EmbeddedDocument>> {
        let document = self.collection.find_one(Self::key_filter(key)).await?;
        Ok(document)
    }

    #[instrument(skip(self))]
    async fn count(&self) -> MaintenanceResult<u64> {
        let count = self.collection.count_documents(doc! {}).await?;
        Ok(count)
    }
}
