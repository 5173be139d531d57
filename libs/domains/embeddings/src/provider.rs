use async_trait::async_trait;

use crate::error::EmbeddingResult;
use crate::models::Embedding;

/// Trait for embedding generation providers
///
/// One remote call per invocation. Implementations must not retry internally:
/// the batch pipeline skips a record on failure while the interactive loop
/// degrades to an event without a vector, and each caller owns its backoff.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier sent with every request
    fn model(&self) -> &str;

    /// Dimension of the vectors seen so far, `None` before the first response
    fn dimension(&self) -> Option<usize>;

    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> EmbeddingResult<Embedding>;

    /// Generate embeddings for several texts in one call, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>>;
}
