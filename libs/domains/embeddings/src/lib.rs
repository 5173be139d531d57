//! Embeddings Domain Library
//!
//! Turns free text into semantic vectors through a remote embedding service.
//!
//! ```text
//! ┌──────────────────┐
//! │ EmbeddingProvider│  ← trait consumed by the ingestion pipeline and the query loop
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │  VoyageProvider  │  ← Voyage AI HTTP implementation
//! └──────────────────┘
//! ```
//!
//! Providers make exactly one remote call per invocation and never retry;
//! retry policy belongs to the caller.
//!
//! # Usage
//!
//! ```rust,no_run
//! use core_config::FromEnv;
//! use domain_embeddings::{EmbeddingProvider, VoyageConfig, VoyageProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = VoyageProvider::new(VoyageConfig::from_env()?)?;
//! let embedding = provider.embed("pump overheating").await?;
//! let wire_values: Vec<f32> = embedding.to_f32();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod models;
pub mod provider;
pub mod voyage;

pub use error::{EmbeddingError, EmbeddingResult};
pub use models::{Embedding, InputType};
pub use provider::EmbeddingProvider;
pub use voyage::{VoyageConfig, VoyageProvider};
