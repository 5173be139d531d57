//! In-memory broker
//!
//! Keeps every delivered payload so callers can inspect what was published.
//! Used for tests and dry runs; behaves like a single-partition topic per
//! destination.

use crate::broker::{EnqueueRejection, StreamBroker};
use crate::delivery::{DeliveryOutcome, DeliveryTicket};
use crate::error::PublishError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A payload the in-memory broker has acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub destination: String,
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
}

struct Queued {
    destination: String,
    payload: Vec<u8>,
    ticket: DeliveryTicket,
}

#[derive(Default)]
struct State {
    queued: VecDeque<Queued>,
    stored: Vec<StoredMessage>,
    offsets: HashMap<String, i64>,
    queue_full_remaining: u32,
    rejected: HashSet<String>,
    failing: HashSet<String>,
    hold: bool,
}

#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<State>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refuse the next `count` produce calls with a full queue
    pub fn fill_queue(&self, count: u32) {
        self.state().queue_full_remaining = count;
    }

    /// Refuse produce calls for `destination` synchronously
    pub fn reject_destination(&self, destination: &str) {
        self.state().rejected.insert(destination.to_string());
    }

    /// Accept payloads for `destination` but report them as failed
    pub fn fail_destination(&self, destination: &str) {
        self.state().failing.insert(destination.to_string());
    }

    /// While held, queued payloads are not delivered by `poll` or `flush`
    pub fn hold_deliveries(&self, hold: bool) {
        self.state().hold = hold;
    }

    /// Acknowledged payloads, in delivery order
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.state().stored.clone()
    }

    /// Payloads accepted but not yet reported
    pub fn queued(&self) -> usize {
        self.state().queued.len()
    }

    fn deliver_queued(&self) {
        let completions: Vec<(DeliveryTicket, DeliveryOutcome)> = {
            let mut state = self.state();
            if state.hold {
                return;
            }

            let queued: Vec<Queued> = state.queued.drain(..).collect();
            queued
                .into_iter()
                .map(|item| {
                    if state.failing.contains(&item.destination) {
                        let error = PublishError::Broker(format!("delivery to {} failed", item.destination));
                        return (item.ticket, DeliveryOutcome::failed(error));
                    }

                    let next = state.offsets.entry(item.destination.clone()).or_insert(0);
                    let offset = *next;
                    *next += 1;
                    state.stored.push(StoredMessage {
                        destination: item.destination.clone(),
                        payload: item.payload,
                        partition: 0,
                        offset,
                    });

                    let outcome = DeliveryOutcome::Delivered {
                        topic: item.destination,
                        partition: 0,
                        offset,
                    };
                    (item.ticket, outcome)
                })
                .collect()
        };

        // Callbacks run without the lock held
        for (ticket, outcome) in completions {
            ticket.complete(outcome);
        }
    }
}

impl StreamBroker for MemoryBroker {
    fn produce(
        &self,
        destination: &str,
        payload: &[u8],
        ticket: DeliveryTicket,
    ) -> Result<(), EnqueueRejection> {
        let mut state = self.state();

        if state.queue_full_remaining > 0 {
            state.queue_full_remaining -= 1;
            return Err(EnqueueRejection {
                error: PublishError::QueueFull,
                ticket,
            });
        }

        if state.rejected.contains(destination) {
            return Err(EnqueueRejection {
                error: PublishError::Broker(format!("unknown destination: {destination}")),
                ticket,
            });
        }

        state.queued.push_back(Queued {
            destination: destination.to_string(),
            payload: payload.to_vec(),
            ticket,
        });
        Ok(())
    }

    fn poll(&self, _timeout: Duration) {
        self.deliver_queued();
    }

    fn flush(&self, _timeout: Duration) -> Result<(), PublishError> {
        self.deliver_queued();
        match self.queued() {
            0 => Ok(()),
            remaining => Err(PublishError::Broker(format!(
                "flush timed out with {remaining} messages queued"
            ))),
        }
    }
}
