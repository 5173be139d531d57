//! Maintenance Ingest
//!
//! One-shot batch job over a JSON array of maintenance records.
//!
//! ## Flow
//!
//! ```text
//! JSON file (fully loaded)
//!   ↓
//! IngestionPipeline: summarize → embed (Voyage) → upsert
//!   ↓
//! MongoDB collection (keyed by record_id)
//! ```
//!
//! Only an unreadable input file, an unreachable store at startup or invalid
//! configuration stop the job. Record-level problems end up in the report.

use clap::Parser;
use core_config::{FromEnv, env_or_default};
use database::RetryConfig;
use database::mongodb::{MongoConfig, connect_from_config_with_retry};
use domain_embeddings::{EmbeddingProvider, VoyageProvider};
use domain_maintenance::{
    BatchReport, DocumentSink, InMemoryDocumentSink, IngestOptions, IngestionPipeline, MongoDocumentSink,
    PersistencePolicy, load_records,
};
use eyre::{Result, WrapErr, bail};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_INPUT: &str = "mockdata_equipment-maintenance-logs.json";

#[derive(Debug, Parser)]
#[command(name = "maintenance-ingest")]
#[command(about = "Embed equipment maintenance logs and upsert them into MongoDB")]
pub struct IngestArgs {
    /// JSON file holding an array of maintenance records
    #[arg(default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Records processed at once (output order is kept)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Stop the batch at the first persistence failure
    #[arg(long)]
    pub abort_on_persistence_error: bool,

    /// Retry unavailable embeddings this many times before skipping the record
    #[arg(long, value_name = "RETRIES")]
    pub retry_embeddings: Option<u32>,

    /// Keep documents in memory instead of writing to MongoDB
    #[arg(long)]
    pub dry_run: bool,
}

impl IngestArgs {
    pub fn options(&self) -> IngestOptions {
        let policy = if self.abort_on_persistence_error {
            PersistencePolicy::Abort
        } else {
            PersistencePolicy::Continue
        };

        let mut options = IngestOptions::default()
            .with_concurrency(usize::from(self.concurrency))
            .with_persistence_policy(policy);
        if let Some(retries) = self.retry_embeddings {
            options = options.with_embed_retry(RetryConfig::new().with_max_retries(retries));
        }
        options
    }
}

/// Run the ingest job described by `args`
///
/// # Errors
///
/// Returns an error if:
/// - the input file cannot be read or is not a JSON array
/// - Voyage or MongoDB configuration is invalid
/// - MongoDB is unreachable at startup
pub async fn run(args: IngestArgs) -> Result<BatchReport> {
    info!(input = %args.input.display(), dry_run = args.dry_run, "Starting maintenance ingest");

    let provider = VoyageProvider::from_env().wrap_err("Failed to configure the embedding provider")?;
    info!(model = provider.model(), "Embedding provider ready");

    let options = args.options();

    if args.dry_run {
        let pipeline = IngestionPipeline::new(provider, InMemoryDocumentSink::new()).with_options(options);
        return ingest_file(&pipeline, &args.input).await;
    }

    let mongo_config = MongoConfig::from_env().wrap_err("Failed to load MongoDB configuration")?;
    let collection = env_or_default("MONGODB_COLLECTION", domain_maintenance::mongodb::DEFAULT_COLLECTION);

    info!("Connecting to MongoDB...");
    let client = connect_from_config_with_retry(&mongo_config, None)
        .await
        .wrap_err("Failed to connect to MongoDB")?;

    let sink = MongoDocumentSink::with_collection(client.database(mongo_config.database()), &collection);
    sink.ensure_indexes()
        .await
        .wrap_err("Failed to create the record_id index")?;
    info!(database = mongo_config.database(), %collection, "Document sink ready");

    let pipeline = IngestionPipeline::new(provider, sink).with_options(options);
    ingest_file(&pipeline, &args.input).await
}

/// Load `path` and push every record through `pipeline`
///
/// The file is read completely before the first record is processed.
pub async fn ingest_file<P, S>(pipeline: &IngestionPipeline<P, S>, path: &Path) -> Result<BatchReport>
where
    P: EmbeddingProvider,
    S: DocumentSink,
{
    let records = load_records(path).wrap_err("Failed to load maintenance records")?;
    info!(count = records.len(), input = %path.display(), "Loaded maintenance records");

    let report = pipeline.ingest(records).await;

    for failure in report.failures() {
        if let Err(error) = &failure.result {
            warn!(index = failure.index, record_id = ?failure.record_id, %error, "Record not persisted");
        }
    }
    info!(
        processed = report.processed,
        inserted = report.inserted,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        aborted = report.aborted,
        "Ingest finished"
    );
    Ok(report)
}

/// Human-readable report for the terminal
pub fn render_report(report: &BatchReport) -> String {
    let mut out = format!(
        "Ingested {} records: {} inserted, {} updated, {} skipped, {} failed",
        report.records.len(),
        report.inserted,
        report.updated,
        report.skipped,
        report.failed
    );

    for record in &report.records {
        if let Err(error) = &record.result {
            let label = record
                .record_id
                .clone()
                .unwrap_or_else(|| format!("#{}", record.index));
            let _ = write!(out, "\n  {label}: {error}");
        }
    }

    if report.aborted {
        out.push_str("\nBatch aborted after a persistence failure");
    }
    out
}

/// Turn an aborted batch into a process failure
pub fn ensure_completed(report: &BatchReport) -> Result<()> {
    if report.aborted {
        bail!(
            "batch aborted after {} of the records; {} persisted",
            report.records.len(),
            report.processed
        );
    }
    Ok(())
}
