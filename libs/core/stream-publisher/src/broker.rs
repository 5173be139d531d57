//! Broker boundary
//!
//! A broker accepts payloads together with their [`DeliveryTicket`] and
//! completes each ticket when it learns the payload's fate. Brokers that
//! report asynchronously do so from inside [`StreamBroker::poll`] or
//! [`StreamBroker::flush`].

use crate::delivery::DeliveryTicket;
use crate::error::PublishError;
use std::fmt;
use std::time::Duration;

/// Synchronous refusal to enqueue; hands the ticket back to the caller
pub struct EnqueueRejection {
    pub error: PublishError,
    pub ticket: DeliveryTicket,
}

impl fmt::Debug for EnqueueRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueRejection")
            .field("error", &self.error)
            .field("ticket", &self.ticket.id())
            .finish()
    }
}

pub trait StreamBroker: Send + Sync {
    /// Queue `payload` for `destination` without waiting for the broker
    fn produce(
        &self,
        destination: &str,
        payload: &[u8],
        ticket: DeliveryTicket,
    ) -> Result<(), EnqueueRejection>;

    /// Dispatch pending delivery reports, waiting at most `timeout`
    fn poll(&self, timeout: Duration);

    /// Wait until every queued payload has a delivery report or `timeout` elapses
    fn flush(&self, timeout: Duration) -> Result<(), PublishError>;
}
