//! Schema registry boundary
//!
//! Read-only access to registered Avro schemas, by subject (latest version)
//! or by the numeric id embedded in every framed payload.

use apache_avro::Schema;
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_optional_any, env_parse_or, env_required_any};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{QueryError, QueryResult};

/// Schema of the user-query topic, as declared by the downstream Flink table
pub const USER_QUERY_SCHEMA: &str = r#"{
  "type": "record",
  "name": "user_query_embeddings_value",
  "namespace": "org.apache.flink.avro.generated.record",
  "fields": [
    { "name": "msg", "type": ["null", "string"], "default": null },
    {
      "name": "vector",
      "type": ["null", { "type": "array", "items": ["null", "float"] }],
      "default": null
    }
  ]
}"#;

/// Subject under which a topic's value schema is registered
pub fn value_subject(topic: &str) -> String {
    format!("{topic}-value")
}

fn parse_schema(raw: &str) -> QueryResult<Arc<Schema>> {
    Schema::parse_str(raw)
        .map(Arc::new)
        .map_err(|e| QueryError::Registry(format!("invalid schema: {e}")))
}

/// A schema together with its registry id
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredSchema {
    pub id: u32,
    pub schema: Arc<Schema>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Latest schema registered under `subject`
    async fn latest(&self, subject: &str) -> QueryResult<RegisteredSchema>;

    /// Schema registered under `id`
    async fn by_id(&self, id: u32) -> QueryResult<RegisteredSchema>;
}

/// In-memory registry for tests and offline runs
#[derive(Debug, Default, Clone)]
pub struct StaticSchemaRegistry {
    subjects: HashMap<String, u32>,
    schemas: HashMap<u32, Arc<Schema>>,
}

impl StaticSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the user-query schema under `subject`
    pub fn user_queries(subject: &str, id: u32) -> QueryResult<Self> {
        Self::new().with_schema(subject, id, USER_QUERY_SCHEMA)
    }

    /// Parse and register `raw` as the latest schema of `subject`
    pub fn with_schema(mut self, subject: &str, id: u32, raw: &str) -> QueryResult<Self> {
        self.register(subject, id, parse_schema(raw)?);
        Ok(self)
    }

    pub fn register(&mut self, subject: &str, id: u32, schema: Arc<Schema>) {
        self.subjects.insert(subject.to_string(), id);
        self.schemas.insert(id, schema);
    }
}

#[async_trait]
impl SchemaRegistry for StaticSchemaRegistry {
    async fn latest(&self, subject: &str) -> QueryResult<RegisteredSchema> {
        let id = *self
            .subjects
            .get(subject)
            .ok_or_else(|| QueryError::Registry(format!("subject not found: {subject}")))?;
        self.by_id(id).await
    }

    async fn by_id(&self, id: u32) -> QueryResult<RegisteredSchema> {
        self.schemas
            .get(&id)
            .map(|schema| RegisteredSchema {
                id,
                schema: schema.clone(),
            })
            .ok_or_else(|| QueryError::Registry(format!("schema id not found: {id}")))
    }
}

/// Confluent-compatible registry connection settings
#[derive(Clone)]
pub struct SchemaRegistryConfig {
    pub url: String,
    /// Basic auth as `key:secret`
    pub auth: Option<String>,
    pub timeout: Duration,
}

impl SchemaRegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    fn credentials(&self) -> QueryResult<Option<(&str, &str)>> {
        match &self.auth {
            None => Ok(None),
            Some(auth) => auth
                .split_once(':')
                .map(Some)
                .ok_or_else(|| QueryError::Config("registry auth must be 'key:secret'".to_string())),
        }
    }
}

impl fmt::Debug for SchemaRegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistryConfig")
            .field("url", &self.url)
            .field("auth", &self.auth.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FromEnv for SchemaRegistryConfig {
    /// - `SCHEMA_REGISTRY_URL` or `CC_SCHEMA_REGISTRY_URI` (required)
    /// - `SCHEMA_REGISTRY_AUTH` or `CC_SCHEMA_REGISTRY_AUTH` (optional, `key:secret`)
    /// - `SCHEMA_REGISTRY_TIMEOUT_SECS` (default: 10)
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(env_required_any(&["SCHEMA_REGISTRY_URL", "CC_SCHEMA_REGISTRY_URI"])?);
        if let Some(auth) = env_optional_any(&["SCHEMA_REGISTRY_AUTH", "CC_SCHEMA_REGISTRY_AUTH"]) {
            config = config.with_auth(auth);
        }
        config.timeout = Duration::from_secs(env_parse_or("SCHEMA_REGISTRY_TIMEOUT_SECS", 10)?);
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct SubjectVersionResponse {
    id: u32,
    schema: String,
}

#[derive(Debug, Deserialize)]
struct SchemaByIdResponse {
    schema: String,
}

/// HTTP client for a Confluent-compatible schema registry
///
/// Schemas are cached for the life of the client: ids are immutable, and the
/// latest version of a subject is resolved once.
pub struct HttpSchemaRegistry {
    client: Client,
    config: SchemaRegistryConfig,
    by_subject: RwLock<HashMap<String, RegisteredSchema>>,
    by_id: RwLock<HashMap<u32, Arc<Schema>>>,
}

impl HttpSchemaRegistry {
    pub fn new(config: SchemaRegistryConfig) -> QueryResult<Self> {
        config.credentials()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QueryError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            by_subject: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_env() -> QueryResult<Self> {
        Self::new(SchemaRegistryConfig::from_env()?)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> QueryResult<T> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.schemaregistry.v1+json");

        if let Some((key, secret)) = self.config.credentials()? {
            request = request.basic_auth(key, Some(secret));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Registry(format!("GET {path} returned {status}: {body}")));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    #[instrument(skip(self))]
    async fn latest(&self, subject: &str) -> QueryResult<RegisteredSchema> {
        if let Some(cached) = self.by_subject.read().await.get(subject) {
            return Ok(cached.clone());
        }

        let path = format!("/subjects/{}/versions/latest", urlencoding::encode(subject));
        let response: SubjectVersionResponse = self.get(&path).await?;
        let registered = RegisteredSchema {
            id: response.id,
            schema: parse_schema(&response.schema)?,
        };

        debug!(id = registered.id, "Resolved latest schema");
        self.by_id
            .write()
            .await
            .insert(registered.id, registered.schema.clone());
        self.by_subject
            .write()
            .await
            .insert(subject.to_string(), registered.clone());
        Ok(registered)
    }

    #[instrument(skip(self))]
    async fn by_id(&self, id: u32) -> QueryResult<RegisteredSchema> {
        if let Some(schema) = self.by_id.read().await.get(&id) {
            return Ok(RegisteredSchema {
                id,
                schema: schema.clone(),
            });
        }

        let response: SchemaByIdResponse = self.get(&format!("/schemas/ids/{id}")).await?;
        let schema = parse_schema(&response.schema)?;
        self.by_id.write().await.insert(id, schema.clone());
        Ok(RegisteredSchema { id, schema })
    }
}
