//! Stream Publisher
//!
//! Sends payloads to named destinations and reports delivery asynchronously.
//!
//! ## Features
//!
//! - **Non-blocking publish**: payloads are queued, outcomes arrive later
//! - **Delivery tracking**: a ticket per payload, completed exactly once
//! - **Outcome pump**: `poll_outcomes` dispatches callbacks on the caller's task
//! - **Drain**: bounded wait for everything in flight on shutdown
//! - **Kafka backend**: rdkafka `BaseProducer`, SASL_SSL/PLAIN when configured
//!
//! ## Example
//!
//! ```ignore
//! use stream_publisher::{KafkaBroker, KafkaConfig, StreamPublisher};
//!
//! let publisher = StreamPublisher::new(KafkaBroker::new(&KafkaConfig::from_env()?)?)
//!     .on_delivery(|outcome| tracing::info!(?outcome, "delivery report"));
//!
//! publisher.publish("user_query_embeddings", &bytes);
//! publisher.poll_outcomes();
//! let report = publisher.drain(Duration::from_secs(30));
//! ```

mod broker;
mod config;
mod delivery;
mod error;
#[cfg(feature = "kafka")]
mod kafka;
pub mod memory;
pub mod metrics;
mod publisher;

pub use broker::{EnqueueRejection, StreamBroker};
pub use config::{KafkaConfig, PublisherConfig};
pub use delivery::{DeliveryCallback, DeliveryHandle, DeliveryOutcome, DeliveryTicket, DrainReport};
pub use error::PublishError;
#[cfg(feature = "kafka")]
pub use kafka::{KafkaBroker, TicketContext};
pub use memory::{MemoryBroker, StoredMessage};
pub use metrics::PublisherMetrics;
pub use publisher::StreamPublisher;
