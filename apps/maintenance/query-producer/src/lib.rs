//! Maintenance Query Producer
//!
//! Interactive front end for semantic search over maintenance logs.
//!
//! ## Architecture
//!
//! ```text
//! stdin (one query per line)
//!   ↓
//! QueryLoop
//!   ├─ VoyageProvider        (embedding, optional)
//!   ├─ HttpSchemaRegistry    (Avro schema by subject)
//!   └─ StreamPublisher<KafkaBroker>
//!        ↓
//! Kafka topic (QUERY_TOPIC) → downstream Flink job
//! ```
//!
//! Delivery reports are printed as they arrive. On exit every in-flight
//! message is flushed, bounded by `DRAIN_TIMEOUT_SECS`.

use core_config::{ConfigError, FromEnv};
use domain_embeddings::VoyageProvider;
use domain_queries::{EventEncoder, HttpSchemaRegistry, LoopSummary, QueryLoop, QueryLoopConfig, SchemaRegistryConfig};
use eyre::{Result, WrapErr};
use std::time::Duration;
use stream_publisher::{DeliveryOutcome, KafkaBroker, KafkaConfig, StreamPublisher};
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the producer reads from the environment, apart from Voyage
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub query: QueryLoopConfig,
    pub kafka: KafkaConfig,
    pub registry: SchemaRegistryConfig,
}

impl FromEnv for ProducerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            query: QueryLoopConfig::from_env()?,
            kafka: KafkaConfig::from_env()?,
            registry: SchemaRegistryConfig::from_env()?,
        })
    }
}

/// Terminal line for a delivery report
pub fn format_outcome(outcome: &DeliveryOutcome) -> String {
    match outcome {
        DeliveryOutcome::Delivered {
            topic,
            partition,
            offset,
        } => format!("Delivered message to {topic} [{partition}] @ offset {offset}"),
        DeliveryOutcome::Failed { error } => format!("Delivery failed: {error}"),
    }
}

/// Run the interactive producer on stdin/stdout
///
/// # Errors
///
/// Returns an error if configuration is invalid or the Kafka client cannot
/// be created. Everything after startup is reported, not returned.
pub async fn run() -> Result<LoopSummary> {
    let settings = ProducerSettings::from_env().wrap_err("Failed to load producer configuration")?;
    info!(
        topic = %settings.query.topic,
        subject = %settings.query.subject,
        kafka = ?settings.kafka,
        registry = ?settings.registry,
        "Starting query producer"
    );

    let provider = VoyageProvider::from_env().wrap_err("Failed to configure the embedding provider")?;
    let registry = HttpSchemaRegistry::new(settings.registry).wrap_err("Failed to create the schema registry client")?;
    let broker = KafkaBroker::new(&settings.kafka).wrap_err("Failed to create the Kafka producer")?;

    match broker.check_connectivity(CONNECTIVITY_TIMEOUT) {
        Ok(brokers) => info!(brokers, "Kafka cluster reachable"),
        Err(error) => warn!(%error, "Kafka metadata unavailable; deliveries will be retried by the client"),
    }

    let publisher = StreamPublisher::new(broker).on_delivery(|outcome| println!("{}", format_outcome(outcome)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut query_loop = QueryLoop::new(provider, EventEncoder::new(registry), publisher, settings.query);
    let summary = query_loop
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), shutdown_rx)
        .await;

    if !summary.drain.is_complete() {
        error!(pending = summary.drain.pending, "Messages still undelivered after drain timeout");
    }
    info!(
        queries = summary.queries,
        published = summary.published,
        delivered = summary.drain.delivered,
        failed = summary.drain.failed,
        "Query producer stopped"
    );
    Ok(summary)
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
