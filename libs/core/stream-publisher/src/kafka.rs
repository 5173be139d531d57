//! Kafka broker backend
//!
//! Built on rdkafka's `BaseProducer`. Each ticket rides along as the message's
//! delivery opaque and is completed from the producer context when librdkafka
//! reports the delivery, which happens inside `poll` or `flush`.

use crate::broker::{EnqueueRejection, StreamBroker};
use crate::config::KafkaConfig;
use crate::delivery::{DeliveryOutcome, DeliveryTicket};
use crate::error::PublishError;
use rdkafka::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use rdkafka::types::RDKafkaErrorCode;
use std::time::Duration;
use tracing::{info, instrument};

/// Producer context that completes delivery tickets
pub struct TicketContext;

impl ClientContext for TicketContext {}

impl ProducerContext for TicketContext {
    type DeliveryOpaque = Box<DeliveryTicket>;

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, ticket: Self::DeliveryOpaque) {
        let outcome = match delivery_result {
            Ok(message) => DeliveryOutcome::Delivered {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
            Err((error, _)) => DeliveryOutcome::failed(map_kafka_error(error)),
        };
        ticket.complete(outcome);
    }
}

fn map_kafka_error(error: &KafkaError) -> PublishError {
    match error {
        KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => PublishError::QueueFull,
        other => PublishError::Broker(other.to_string()),
    }
}

pub struct KafkaBroker {
    producer: BaseProducer<TicketContext>,
}

impl KafkaBroker {
    /// Create the producer; does not contact the cluster
    #[instrument(skip(config), fields(bootstrap_servers = %config.bootstrap_servers, sasl = config.uses_sasl()))]
    pub fn new(config: &KafkaConfig) -> Result<Self, PublishError> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.client_properties() {
            client_config.set(key, value);
        }

        let producer: BaseProducer<TicketContext> = client_config
            .create_with_context(TicketContext)
            .map_err(|e| PublishError::Config(format!("Failed to create Kafka producer: {e}")))?;

        info!("Kafka producer created");
        Ok(Self { producer })
    }

    /// Fetch cluster metadata to confirm the brokers are reachable
    pub fn check_connectivity(&self, timeout: Duration) -> Result<usize, PublishError> {
        let metadata = self
            .producer
            .client()
            .fetch_metadata(None, timeout)
            .map_err(|e| PublishError::Broker(format!("Kafka cluster unreachable: {e}")))?;
        Ok(metadata.brokers().len())
    }
}

impl StreamBroker for KafkaBroker {
    fn produce(
        &self,
        destination: &str,
        payload: &[u8],
        ticket: DeliveryTicket,
    ) -> Result<(), EnqueueRejection> {
        let record = BaseRecord::<(), [u8], Box<DeliveryTicket>>::with_opaque_to(destination, Box::new(ticket))
            .payload(payload);

        self.producer
            .send(record)
            .map_err(|(error, record)| EnqueueRejection {
                error: map_kafka_error(&error),
                ticket: *record.delivery_opaque,
            })
    }

    fn poll(&self, timeout: Duration) {
        self.producer.poll(timeout);
    }

    fn flush(&self, timeout: Duration) -> Result<(), PublishError> {
        self.producer
            .flush(timeout)
            .map_err(|e| PublishError::Broker(format!("Flush failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamPublisher;

    #[test]
    fn test_queue_full_maps_to_retryable_error() {
        let error = KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull);
        assert_eq!(map_kafka_error(&error), PublishError::QueueFull);
    }

    #[test]
    fn test_other_errors_map_to_broker() {
        let error = KafkaError::MessageProduction(RDKafkaErrorCode::UnknownTopicOrPartition);
        assert!(matches!(map_kafka_error(&error), PublishError::Broker(_)));
    }

    #[test]
    fn test_new_does_not_connect() {
        let broker = KafkaBroker::new(&KafkaConfig::new("127.0.0.1:1"));
        assert!(broker.is_ok());
    }

    #[test]
    #[ignore = "requires a Kafka broker on localhost:9092"]
    fn test_publish_to_local_kafka() {
        let broker = KafkaBroker::new(&KafkaConfig::new("localhost:9092")).unwrap();
        broker.check_connectivity(Duration::from_secs(5)).unwrap();

        let publisher = StreamPublisher::new(broker);
        publisher.publish("stream-publisher-test", b"hello");
        let report = publisher.drain(Duration::from_secs(10));

        assert_eq!(report.delivered, 1);
        assert!(report.is_complete());
    }
}
