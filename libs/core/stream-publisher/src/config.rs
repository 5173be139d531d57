//! Publisher configuration
//!
//! `KafkaConfig` describes the broker connection, `PublisherConfig` the
//! publisher's own behaviour around it.

use core_config::{ConfigError, FromEnv, env_optional, env_optional_any, env_parse_or, env_required_any};
use std::fmt;
use std::time::Duration;

/// Kafka connection settings
#[derive(Clone)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` list
    pub bootstrap_servers: String,

    /// SASL username (Confluent Cloud API key); enables SASL_SSL/PLAIN when set
    pub api_key: Option<String>,

    /// SASL password (Confluent Cloud API secret)
    pub api_secret: Option<String>,

    /// Client identifier reported to the broker
    pub client_id: String,

    /// Upper bound on the time a message may spend unacknowledged
    pub message_timeout_ms: u64,
}

impl KafkaConfig {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            api_key: None,
            api_secret: None,
            client_id: env!("CARGO_PKG_NAME").to_string(),
            message_timeout_ms: 30_000,
        }
    }

    /// Set SASL/PLAIN credentials
    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_message_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.message_timeout_ms = timeout_ms;
        self
    }

    /// Whether SASL_SSL authentication is configured
    pub fn uses_sasl(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    /// librdkafka properties for this configuration
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![
            ("bootstrap.servers", self.bootstrap_servers.clone()),
            ("client.id", self.client_id.clone()),
            ("message.timeout.ms", self.message_timeout_ms.to_string()),
        ];

        if let (Some(key), Some(secret)) = (&self.api_key, &self.api_secret) {
            props.push(("security.protocol", "SASL_SSL".to_string()));
            props.push(("sasl.mechanisms", "PLAIN".to_string()));
            props.push(("sasl.username", key.clone()));
            props.push(("sasl.password", secret.clone()));
        }

        props
    }
}

impl fmt::Debug for KafkaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaConfig")
            .field("bootstrap_servers", &self.bootstrap_servers)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("client_id", &self.client_id)
            .field("message_timeout_ms", &self.message_timeout_ms)
            .finish()
    }
}

impl FromEnv for KafkaConfig {
    /// - `KAFKA_BOOTSTRAP_SERVERS` or `CC_BOOTSTRAP_SERVER` (required)
    /// - `KAFKA_API_KEY` / `KAFKA_API_SECRET`, or `CC_CLUSTER_API_KEY` / `CC_CLUSTER_API_SECRET` (optional, both or neither)
    /// - `KAFKA_CLIENT_ID` (default: crate name)
    /// - `KAFKA_MESSAGE_TIMEOUT_MS` (default: 30000)
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(env_required_any(&["KAFKA_BOOTSTRAP_SERVERS", "CC_BOOTSTRAP_SERVER"])?);

        match (
            env_optional_any(&["KAFKA_API_KEY", "CC_CLUSTER_API_KEY"]),
            env_optional_any(&["KAFKA_API_SECRET", "CC_CLUSTER_API_SECRET"]),
        ) {
            (Some(key), Some(secret)) => config = config.with_credentials(key, secret),
            (None, None) => {}
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("KAFKA_API_SECRET".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("KAFKA_API_KEY".to_string())),
        }

        if let Some(client_id) = env_optional("KAFKA_CLIENT_ID") {
            config = config.with_client_id(client_id);
        }

        Ok(config.with_message_timeout_ms(env_parse_or("KAFKA_MESSAGE_TIMEOUT_MS", 30_000)?))
    }
}

/// Behaviour of the publisher around its broker
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// How many times a payload is re-offered after a full local queue
    pub max_enqueue_retries: u32,

    /// How long to pump outcomes before each re-offer
    pub queue_full_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_enqueue_retries: 3,
            queue_full_backoff: Duration::from_millis(100),
        }
    }
}

impl PublisherConfig {
    pub fn with_max_enqueue_retries(mut self, retries: u32) -> Self {
        self.max_enqueue_retries = retries;
        self
    }

    pub fn with_queue_full_backoff(mut self, backoff: Duration) -> Self {
        self.queue_full_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop<'a>(props: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        props.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_plaintext_properties() {
        let config = KafkaConfig::new("localhost:9092");
        let props = config.client_properties();

        assert!(!config.uses_sasl());
        assert_eq!(prop(&props, "bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(prop(&props, "security.protocol"), None);
    }

    #[test]
    fn test_sasl_properties() {
        let config = KafkaConfig::new("broker:9092").with_credentials("key", "secret");
        let props = config.client_properties();

        assert!(config.uses_sasl());
        assert_eq!(prop(&props, "security.protocol"), Some("SASL_SSL"));
        assert_eq!(prop(&props, "sasl.mechanisms"), Some("PLAIN"));
        assert_eq!(prop(&props, "sasl.username"), Some("key"));
        assert_eq!(prop(&props, "sasl.password"), Some("secret"));
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = KafkaConfig::new("broker:9092").with_credentials("key", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("KAFKA_BOOTSTRAP_SERVERS", Some("b1:9092,b2:9092")),
                ("KAFKA_API_KEY", Some("key")),
                ("KAFKA_API_SECRET", Some("secret")),
                ("KAFKA_CLIENT_ID", Some("query-producer")),
                ("KAFKA_MESSAGE_TIMEOUT_MS", None),
            ],
            || {
                let config = KafkaConfig::from_env().unwrap();
                assert_eq!(config.bootstrap_servers, "b1:9092,b2:9092");
                assert_eq!(config.client_id, "query-producer");
                assert_eq!(config.message_timeout_ms, 30_000);
                assert!(config.uses_sasl());
            },
        );
    }

    #[test]
    fn test_from_env_rejects_half_credentials() {
        temp_env::with_vars(
            [
                ("KAFKA_BOOTSTRAP_SERVERS", Some("b1:9092")),
                ("KAFKA_API_KEY", Some("key")),
                ("KAFKA_API_SECRET", None),
                ("CC_CLUSTER_API_SECRET", None),
            ],
            || {
                let err = KafkaConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("KAFKA_API_SECRET"));
            },
        );
    }

    #[test]
    fn test_from_env_requires_bootstrap_servers() {
        temp_env::with_vars_unset(["KAFKA_BOOTSTRAP_SERVERS", "CC_BOOTSTRAP_SERVER"], || {
            assert!(KafkaConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_from_env_confluent_cloud_names() {
        temp_env::with_vars(
            [
                ("KAFKA_BOOTSTRAP_SERVERS", None),
                ("KAFKA_API_KEY", None),
                ("KAFKA_API_SECRET", None),
                ("CC_BOOTSTRAP_SERVER", Some("pkc-1.cloud:9092")),
                ("CC_CLUSTER_API_KEY", Some("key")),
                ("CC_CLUSTER_API_SECRET", Some("secret")),
            ],
            || {
                let config = KafkaConfig::from_env().unwrap();
                assert_eq!(config.bootstrap_servers, "pkc-1.cloud:9092");
                assert!(config.uses_sasl());
            },
        );
    }
}
