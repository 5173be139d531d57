//! Maintenance Domain
//!
//! Turns equipment-maintenance records into embedded documents and stores them
//! idempotently, keyed by `record_id`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ IngestionPipeline│  ← per-record orchestration, batch report
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐     ┌───────────────────┐
//! │    summarize     │ ──► │ EmbeddingProvider │  ← domain_embeddings
//! └────────┬─────────┘     └───────────────────┘
//!          │
//! ┌────────▼─────────┐
//! │   DocumentSink   │  ← trait + MongoDB / in-memory implementations
//! └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_embeddings::VoyageProvider;
//! use domain_maintenance::{IngestOptions, IngestionPipeline, MongoDocumentSink, load_records};
//! use mongodb::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//! let sink = MongoDocumentSink::new(client.database("maintenance"));
//! sink.ensure_indexes().await?;
//!
//! let pipeline = IngestionPipeline::new(VoyageProvider::from_env()?, sink)
//!     .with_options(IngestOptions::default().with_concurrency(4));
//!
//! let records = load_records("mockdata_equipment-maintenance-logs.json".as_ref())?;
//! let report = pipeline.ingest(records).await;
//! println!("{} inserted, {} updated", report.inserted, report.updated);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod models;
#[cfg(feature = "mongodb")]
pub mod mongodb;
pub mod pipeline;
pub mod repository;
pub mod summary;

pub use error::{BatchError, MaintenanceError, MaintenanceResult};
pub use memory::InMemoryDocumentSink;
pub use models::{EmbeddedDocument, MaintenanceRecord, SeverityLevel, Technician, UpsertOutcome};
#[cfg(feature = "mongodb")]
pub use mongodb::MongoDocumentSink;
pub use pipeline::{BatchReport, IngestOptions, IngestionPipeline, PersistencePolicy, RecordReport, load_records};
pub use repository::DocumentSink;
pub use summary::{Summary, summarize};
