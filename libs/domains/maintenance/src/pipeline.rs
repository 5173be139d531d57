//! Batch ingestion pipeline
//!
//! Drives summarize → embed → upsert for each record and keeps one outcome per
//! record. A record's failure never affects another record unless the
//! persistence policy says to abort.

use database::RetryConfig;
use domain_embeddings::{Embedding, EmbeddingError, EmbeddingProvider};
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::error::{BatchError, MaintenanceError};
use crate::models::{EmbeddedDocument, MaintenanceRecord, UpsertOutcome};
use crate::repository::DocumentSink;
use crate::summary::summarize;

/// What to do when a document cannot be persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistencePolicy {
    /// Record the failure and move on
    #[default]
    Continue,
    /// Stop the batch; documents already written stay written
    Abort,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Records processed at once; outcomes are still reported in input order
    pub concurrency: usize,
    pub persistence_policy: PersistencePolicy,
    /// Retry policy for the embedding call; `None` means a single attempt
    pub embed_retry: Option<RetryConfig>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            persistence_policy: PersistencePolicy::Continue,
            embed_retry: None,
        }
    }
}

impl IngestOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_persistence_policy(mut self, policy: PersistencePolicy) -> Self {
        self.persistence_policy = policy;
        self
    }

    pub fn with_embed_retry(mut self, retry: RetryConfig) -> Self {
        self.embed_retry = Some(retry);
        self
    }
}

/// Outcome for one input record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordReport {
    /// Position in the input
    pub index: usize,
    pub record_id: Option<String>,
    pub result: Result<UpsertOutcome, MaintenanceError>,
}

impl RecordReport {
    /// The record was left out because no embedding could be obtained
    pub fn is_skipped(&self) -> bool {
        matches!(self.result, Err(MaintenanceError::EmbeddingUnavailable(_)))
    }

    fn label(&self) -> &'static str {
        match &self.result {
            Ok(UpsertOutcome::Inserted) => "inserted",
            Ok(UpsertOutcome::Updated) => "updated",
            Err(MaintenanceError::EmbeddingUnavailable(_)) => "skipped",
            Err(_) => "failed",
        }
    }
}

/// Per-batch totals plus the per-record outcomes, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Records persisted (inserted + updated)
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The batch stopped early on a persistence failure
    pub aborted: bool,
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    fn push(&mut self, report: RecordReport) {
        match &report.result {
            Ok(UpsertOutcome::Inserted) => {
                self.processed += 1;
                self.inserted += 1;
            }
            Ok(UpsertOutcome::Updated) => {
                self.processed += 1;
                self.updated += 1;
            }
            Err(MaintenanceError::EmbeddingUnavailable(_)) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
        self.records.push(report);
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordReport> {
        self.records.iter().filter(|r| r.result.is_err() && !r.is_skipped())
    }
}

/// Read the whole input file; it must hold a JSON array of records
#[instrument]
pub fn load_records(path: &Path) -> Result<Vec<Value>, BatchError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| BatchError::SourceUnreadable(format!("{}: {e}", path.display())))?;

    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| BatchError::SourceUnreadable(format!("{}: invalid JSON: {e}", path.display())))?;

    match value {
        Value::Array(records) => {
            info!(count = records.len(), "Loaded records");
            Ok(records)
        }
        other => Err(BatchError::SourceUnreadable(format!(
            "{}: expected a JSON array of records, found {}",
            path.display(),
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Batch ingestion over an embedding provider and a document sink
pub struct IngestionPipeline<P: EmbeddingProvider, S: DocumentSink> {
    provider: Arc<P>,
    sink: Arc<S>,
    options: IngestOptions,
}

impl<P: EmbeddingProvider, S: DocumentSink> IngestionPipeline<P, S> {
    pub fn new(provider: P, sink: S) -> Self {
        Self::from_arcs(Arc::new(provider), Arc::new(sink))
    }

    pub fn from_arcs(provider: Arc<P>, sink: Arc<S>) -> Self {
        Self {
            provider,
            sink,
            options: IngestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Ingest `records` and report one outcome per record
    #[instrument(skip(self, records), fields(count = records.len(), concurrency = self.options.concurrency))]
    pub async fn ingest(&self, records: Vec<Value>) -> BatchReport {
        let mut report = BatchReport::default();
        let concurrency = self.options.concurrency.max(1);

        let mut outcomes = stream::iter(records.into_iter().enumerate())
            .map(|(index, raw)| self.process_record(index, raw))
            .buffered(concurrency);

        while let Some(record_report) = outcomes.next().await {
            let abort = self.options.persistence_policy == PersistencePolicy::Abort
                && matches!(record_report.result, Err(MaintenanceError::Persistence(_)));

            counter!("maintenance_records_total", "outcome" => record_report.label()).increment(1);
            report.push(record_report);

            if abort {
                error!(index = report.records.len() - 1, "Persistence failed, aborting batch");
                report.aborted = true;
                break;
            }
        }

        info!(
            processed = report.processed,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            aborted = report.aborted,
            "Batch ingestion finished"
        );
        report
    }

    async fn process_record(&self, index: usize, raw: Value) -> RecordReport {
        let record_id = raw.get("record_id").and_then(Value::as_str).map(str::to_string);
        let result = self.ingest_record(raw).await;

        match &result {
            Ok(outcome) => info!(index, record_id = ?record_id, %outcome, "Record ingested"),
            Err(MaintenanceError::EmbeddingUnavailable(cause)) => {
                warn!(index, record_id = ?record_id, %cause, "Skipping record, embedding unavailable")
            }
            Err(err) => warn!(index, record_id = ?record_id, error = %err, "Record failed"),
        }

        RecordReport {
            index,
            record_id,
            result,
        }
    }

    async fn ingest_record(&self, raw: Value) -> Result<UpsertOutcome, MaintenanceError> {
        if !raw.is_object() {
            return Err(MaintenanceError::MalformedRecord(format!(
                "expected an object, found {}",
                json_kind(&raw)
            )));
        }

        let mut record: MaintenanceRecord =
            serde_json::from_value(raw).map_err(|e| MaintenanceError::MalformedRecord(e.to_string()))?;

        let record_id = record
            .record_id
            .take()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| MaintenanceError::MissingField("record_id".to_string()))?;

        let summary = summarize(&record)?;
        let embedding = self.embed(summary.as_str()).await?;

        if embedding.values.is_empty() {
            return Err(MaintenanceError::EmbeddingUnavailable("empty embedding".to_string()));
        }

        let document = EmbeddedDocument::from_record(record_id.clone(), record, summary.into_string(), embedding.into_values());
        self.sink.upsert(&record_id, &document).await
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        match &self.options.embed_retry {
            Some(retry) => {
                database::retry_if(
                    || self.provider.embed(text),
                    retry.clone(),
                    |err| matches!(err, EmbeddingError::Unavailable(_)),
                )
                .await
            }
            None => self.provider.embed(text).await,
        }
    }
}
