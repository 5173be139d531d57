//! Voyage AI embedding provider
//!
//! `POST {base_url}/embeddings` with a bearer token. The response carries one
//! vector per input text, tagged with its input index.

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or, env_required_any};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::provider::EmbeddingProvider;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::models::{Embedding, InputType};

pub const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";

/// Voyage embedding provider configuration
#[derive(Clone)]
pub struct VoyageConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub input_type: InputType,
    pub timeout: Duration,
}

impl VoyageConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            input_type: InputType::Document,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for VoyageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoyageConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("input_type", &self.input_type)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FromEnv for VoyageConfig {
    /// - `VOYAGE_API_KEY` or `VOYAGEAI_API_KEY` (required)
    /// - `VOYAGE_MODEL` or `VOYAGEAI_TEXT_EMBEDDING_MODEL` (required)
    /// - `VOYAGE_BASE_URL` (default: https://api.voyageai.com/v1)
    /// - `VOYAGE_INPUT_TYPE` (default: document)
    /// - `VOYAGE_TIMEOUT_SECS` (default: 30)
    fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_required_any(&["VOYAGE_API_KEY", "VOYAGEAI_API_KEY"])?;
        let model = env_required_any(&["VOYAGE_MODEL", "VOYAGEAI_TEXT_EMBEDDING_MODEL"])?;

        let raw_input_type = env_or_default("VOYAGE_INPUT_TYPE", InputType::Document.as_ref());
        let input_type =
            InputType::from_str(raw_input_type.trim()).map_err(|e| ConfigError::ParseError {
                key: "VOYAGE_INPUT_TYPE".to_string(),
                details: format!("{e}: expected 'document' or 'query'"),
            })?;

        let timeout_secs: u64 = env_parse_or("VOYAGE_TIMEOUT_SECS", 30)?;

        Ok(Self::new(api_key, model)
            .with_base_url(env_or_default("VOYAGE_BASE_URL", DEFAULT_BASE_URL))
            .with_input_type(input_type)
            .with_timeout(Duration::from_secs(timeout_secs)))
    }
}

/// Voyage AI embeddings provider
pub struct VoyageProvider {
    client: Client,
    config: VoyageConfig,
    dimension: OnceLock<usize>,
}

impl VoyageProvider {
    pub fn new(config: VoyageConfig) -> EmbeddingResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingError::Config("Voyage API key is empty".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(EmbeddingError::Config("Voyage model is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            dimension: OnceLock::new(),
        })
    }

    pub fn from_env() -> EmbeddingResult<Self> {
        Self::new(VoyageConfig::from_env()?)
    }

    pub fn config(&self) -> &VoyageConfig {
        &self.config
    }

    /// Every vector must have the dimension of the first vector ever returned
    fn check_dimension(&self, len: usize) -> EmbeddingResult<()> {
        if len == 0 {
            return Err(EmbeddingError::Unavailable(
                "Voyage API returned an empty vector".to_string(),
            ));
        }
        let expected = *self.dimension.get_or_init(|| len);
        if expected != len {
            return Err(EmbeddingError::Unavailable(format!(
                "Dimension mismatch for model {}: expected {}, got {}",
                self.config.model, expected, len
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: InputType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u64,
}

#[async_trait]
impl EmbeddingProvider for VoyageProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<Embedding> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Unavailable("No embedding returned".to_string()))
    }

    #[instrument(skip(self, texts), fields(model = %self.config.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            input: texts,
            model: &self.config.model,
            input_type: self.config.input_type,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Unavailable(format!(
                "Voyage API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response.json().await?;

        if body.data.len() != texts.len() {
            return Err(EmbeddingError::Unavailable(format!(
                "Voyage API returned {} embeddings for {} inputs",
                body.data.len(),
                texts.len()
            )));
        }

        let mut data = body.data;
        data.sort_by_key(|d| d.index);

        for item in &data {
            self.check_dimension(item.embedding.len())?;
        }

        debug!(
            tokens = body.usage.map(|u| u.total_tokens).unwrap_or_default(),
            dimension = ?self.dimension(),
            "Embeddings generated"
        );

        Ok(data
            .into_iter()
            .map(|d| Embedding::new(self.config.model.clone(), d.embedding))
            .collect())
    }
}
