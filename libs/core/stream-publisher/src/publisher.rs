//! Stream publisher
//!
//! Wraps a [`StreamBroker`] with delivery tracking. `publish` never blocks on
//! the broker and never returns an error: every accepted payload resolves
//! through its [`DeliveryHandle`] and the publisher's delivery callback.
//!
//! # Example
//!
//! ```rust,ignore
//! use stream_publisher::{KafkaBroker, KafkaConfig, StreamPublisher};
//!
//! let broker = KafkaBroker::new(&KafkaConfig::from_env()?)?;
//! let publisher = StreamPublisher::new(broker)
//!     .on_delivery(|outcome| println!("{outcome:?}"));
//!
//! let handle = publisher.publish("user_query_embeddings", &payload);
//! publisher.poll_outcomes();
//! let report = publisher.drain(Duration::from_secs(30));
//! ```

use crate::broker::{EnqueueRejection, StreamBroker};
use crate::config::PublisherConfig;
use crate::delivery::{DeliveryCallback, DeliveryHandle, DeliveryOutcome, DeliveryTicket, DrainReport, Tracker};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct StreamPublisher<B: StreamBroker> {
    broker: B,
    tracker: Arc<Tracker>,
    config: PublisherConfig,
    next_id: AtomicU64,
}

impl<B: StreamBroker> StreamPublisher<B> {
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            tracker: Arc::new(Tracker::new(None)),
            config: PublisherConfig::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the delivery callback; call before the first publish
    pub fn on_delivery<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DeliveryOutcome) + Send + Sync + 'static,
    {
        let callback: DeliveryCallback = Arc::new(callback);
        self.tracker = Arc::new(Tracker::new(Some(callback)));
        self
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Queue `payload` for `destination`
    ///
    /// A full local queue is retried after pumping outcomes, up to
    /// `max_enqueue_retries` times. Any other refusal completes the ticket as
    /// failed right away.
    pub fn publish(&self, destination: &str, payload: &[u8]) -> DeliveryHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (mut ticket, handle) = DeliveryTicket::issue(id, destination, self.tracker.clone());
        let mut attempt = 0;

        loop {
            match self.broker.produce(destination, payload, ticket) {
                Ok(()) => {
                    debug!(id, destination, bytes = payload.len(), "Payload queued");
                    return handle;
                }
                Err(EnqueueRejection { error, ticket: returned }) => {
                    if error.is_retryable() && attempt < self.config.max_enqueue_retries {
                        attempt += 1;
                        warn!(id, destination, attempt, "Local queue full, pumping outcomes before retry");
                        self.broker.poll(self.config.queue_full_backoff);
                        ticket = returned;
                        continue;
                    }
                    returned.complete(DeliveryOutcome::failed(error));
                    return handle;
                }
            }
        }
    }

    /// Dispatch delivery reports that are already available
    ///
    /// Returns the number of outcomes dispatched by this call.
    pub fn poll_outcomes(&self) -> u64 {
        let before = self.tracker.completed();
        self.broker.poll(Duration::ZERO);
        self.tracker.completed().saturating_sub(before)
    }

    /// Accepted payloads without an outcome yet
    pub fn in_flight(&self) -> u64 {
        self.tracker.in_flight()
    }

    /// Counts so far, without waiting
    pub fn report(&self) -> DrainReport {
        self.tracker.report()
    }

    /// Wait up to `timeout` for every in-flight payload to resolve
    ///
    /// Counts in the report are cumulative over the publisher's lifetime.
    /// Blocks the calling thread while the broker flushes.
    #[instrument(skip(self))]
    pub fn drain(&self, timeout: Duration) -> DrainReport {
        if self.tracker.in_flight() > 0 {
            if let Err(error) = self.broker.flush(timeout) {
                warn!(%error, "Flush did not complete");
            }
        }
        self.broker.poll(Duration::ZERO);

        let report = self.tracker.report();
        if report.is_complete() {
            info!(delivered = report.delivered, failed = report.failed, "Publisher drained");
        } else {
            warn!(
                delivered = report.delivered,
                failed = report.failed,
                pending = report.pending,
                "Publisher drain timed out"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::memory::MemoryBroker;
    use std::sync::Mutex;

    fn recording_publisher() -> (StreamPublisher<MemoryBroker>, Arc<Mutex<Vec<DeliveryOutcome>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let publisher = StreamPublisher::new(MemoryBroker::new())
            .with_config(PublisherConfig::default().with_queue_full_backoff(Duration::ZERO))
            .on_delivery(move |outcome| sink.lock().unwrap().push(outcome.clone()));
        (publisher, seen)
    }

    #[tokio::test]
    async fn test_publish_is_queued_until_polled() {
        let (publisher, seen) = recording_publisher();

        let handle = publisher.publish("queries", b"one");
        assert_eq!(publisher.in_flight(), 1);
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(publisher.poll_outcomes(), 1);
        assert_eq!(publisher.in_flight(), 0);
        assert_eq!(
            handle.outcome().await,
            DeliveryOutcome::Delivered {
                topic: "queries".to_string(),
                partition: 0,
                offset: 0
            }
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_order_matches_publish_order() {
        let (publisher, _) = recording_publisher();

        let handles: Vec<_> = (0..3)
            .map(|i| publisher.publish("queries", format!("m{i}").as_bytes()))
            .collect();
        publisher.poll_outcomes();

        let mut offsets = Vec::new();
        for handle in handles {
            match handle.outcome().await {
                DeliveryOutcome::Delivered { offset, .. } => offsets.push(offset),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(offsets, vec![0, 1, 2]);

        let payloads: Vec<_> = publisher.broker().messages().into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec![b"m0".to_vec(), b"m1".to_vec(), b"m2".to_vec()]);
    }

    #[tokio::test]
    async fn test_sync_rejection_goes_through_callback() {
        let (publisher, seen) = recording_publisher();
        publisher.broker().reject_destination("missing-topic");

        let handle = publisher.publish("missing-topic", b"payload");

        assert!(matches!(
            handle.outcome().await,
            DeliveryOutcome::Failed { error: PublishError::Broker(_) }
        ));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(publisher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_queue_full_is_retried() {
        let (publisher, _) = recording_publisher();
        publisher.broker().fill_queue(2);

        let handle = publisher.publish("queries", b"payload");
        publisher.poll_outcomes();

        assert!(handle.outcome().await.is_delivered());
    }

    #[tokio::test]
    async fn test_queue_full_gives_up_after_retries() {
        let (publisher, _) = recording_publisher();
        publisher.broker().fill_queue(10);

        let handle = publisher.publish("queries", b"payload");

        assert_eq!(
            handle.outcome().await,
            DeliveryOutcome::Failed {
                error: PublishError::QueueFull
            }
        );
    }

    #[test]
    fn test_drain_resolves_everything() {
        let (publisher, seen) = recording_publisher();
        publisher.broker().fail_destination("flaky");

        publisher.publish("queries", b"a");
        publisher.publish("flaky", b"b");
        publisher.publish("queries", b"c");

        let report = publisher.drain(Duration::from_secs(1));

        assert_eq!(
            report,
            DrainReport {
                delivered: 2,
                failed: 1,
                pending: 0
            }
        );
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_drain_reports_pending_on_timeout() {
        let (publisher, seen) = recording_publisher();
        publisher.broker().hold_deliveries(true);

        publisher.publish("queries", b"a");
        let report = publisher.drain(Duration::from_millis(10));

        assert_eq!(report.pending, 1);
        assert!(!report.is_complete());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_drain_with_nothing_in_flight() {
        let (publisher, _) = recording_publisher();
        assert_eq!(publisher.drain(Duration::from_secs(1)), DrainReport::default());
    }
}
