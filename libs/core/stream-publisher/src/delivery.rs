//! Delivery tracking
//!
//! Every accepted payload is paired with a [`DeliveryTicket`] that travels with
//! the message through the broker and a [`DeliveryHandle`] returned to the
//! caller. The ticket is completed exactly once: by the broker's delivery
//! report, by a synchronous enqueue failure, or on drop (as a failure) if the
//! broker discards it without reporting.

use crate::error::PublishError;
use crate::metrics::PublisherMetrics;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Final state of one published payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        topic: String,
        partition: i32,
        offset: i64,
    },
    Failed {
        error: PublishError,
    },
}

impl DeliveryOutcome {
    pub fn failed(error: PublishError) -> Self {
        DeliveryOutcome::Failed { error }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Callback invoked once per completed ticket
pub type DeliveryCallback = Arc<dyn Fn(&DeliveryOutcome) + Send + Sync>;

/// Cumulative counts reported by [`StreamPublisher::drain`](crate::StreamPublisher::drain)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: u64,
    pub failed: u64,
    /// Accepted payloads still without an outcome when the drain returned
    pub pending: u64,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

/// Counters and callback shared by a publisher and all of its tickets
pub(crate) struct Tracker {
    in_flight: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    callback: Option<DeliveryCallback>,
    metrics: PublisherMetrics,
}

impl Tracker {
    pub(crate) fn new(callback: Option<DeliveryCallback>) -> Self {
        Self {
            in_flight: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            callback,
            metrics: PublisherMetrics,
        }
    }

    pub(crate) fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn report(&self) -> DrainReport {
        DrainReport {
            delivered: self.delivered.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            pending: self.in_flight(),
        }
    }

    pub(crate) fn completed(&self) -> u64 {
        self.delivered.load(Ordering::Acquire) + self.failed.load(Ordering::Acquire)
    }

    fn accept(&self, destination: &str) {
        let in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.metrics.published(destination);
        self.metrics.in_flight(in_flight);
    }

    fn record(&self, destination: &str, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.delivered.fetch_add(1, Ordering::AcqRel);
                self.metrics.delivered(destination);
            }
            DeliveryOutcome::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::AcqRel);
                self.metrics.failed(destination);
            }
        }
        let in_flight = self.in_flight.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        self.metrics.in_flight(in_flight);

        if let Some(callback) = &self.callback {
            callback(outcome);
        }
    }
}

/// Completion token carried alongside a payload through the broker
pub struct DeliveryTicket {
    id: u64,
    destination: String,
    tracker: Arc<Tracker>,
    sender: Option<oneshot::Sender<DeliveryOutcome>>,
}

impl DeliveryTicket {
    /// Register a new in-flight payload
    pub(crate) fn issue(
        id: u64,
        destination: &str,
        tracker: Arc<Tracker>,
    ) -> (DeliveryTicket, DeliveryHandle) {
        let (sender, receiver) = oneshot::channel();
        tracker.accept(destination);

        let ticket = DeliveryTicket {
            id,
            destination: destination.to_string(),
            tracker,
            sender: Some(sender),
        };
        (ticket, DeliveryHandle { id, receiver })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Report the outcome; runs the publisher callback and resolves the handle
    pub fn complete(mut self, outcome: DeliveryOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: DeliveryOutcome) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        match &outcome {
            DeliveryOutcome::Delivered {
                topic,
                partition,
                offset,
            } => debug!(id = self.id, %topic, partition, offset, "Message delivered"),
            DeliveryOutcome::Failed { error } => {
                warn!(id = self.id, destination = %self.destination, %error, "Message delivery failed")
            }
        }

        self.tracker.record(&self.destination, &outcome);
        // The caller may have dropped its handle
        let _ = sender.send(outcome);
    }
}

impl Drop for DeliveryTicket {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.finish(DeliveryOutcome::failed(PublishError::Broker(
                "message discarded without a delivery report".to_string(),
            )));
        }
    }
}

impl fmt::Debug for DeliveryTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTicket")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("completed", &self.sender.is_none())
            .finish()
    }
}

/// Caller's view of one published payload
#[derive(Debug)]
pub struct DeliveryHandle {
    id: u64,
    receiver: oneshot::Receiver<DeliveryOutcome>,
}

impl DeliveryHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the outcome
    pub async fn outcome(self) -> DeliveryOutcome {
        self.receiver.await.unwrap_or_else(|_| {
            DeliveryOutcome::failed(PublishError::Broker("delivery outcome lost".to_string()))
        })
    }

    /// Outcome if already known; yields `Some` at most once
    pub fn try_outcome(&mut self) -> Option<DeliveryOutcome> {
        self.receiver.try_recv().ok()
    }
}
