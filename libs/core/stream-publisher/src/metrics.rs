//! Publisher metrics
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the host
//! process installs a recorder.

use metrics::{counter, gauge};

/// Stream publisher metrics helper
#[derive(Debug, Clone, Copy, Default)]
pub struct PublisherMetrics;

impl PublisherMetrics {
    /// Record a payload accepted for publishing
    pub fn published(&self, destination: &str) {
        counter!(
            "stream_publisher_published_total",
            "topic" => destination.to_string()
        )
        .increment(1);
    }

    /// Record a confirmed delivery
    pub fn delivered(&self, destination: &str) {
        counter!(
            "stream_publisher_delivered_total",
            "topic" => destination.to_string()
        )
        .increment(1);
    }

    /// Record a failed delivery
    pub fn failed(&self, destination: &str) {
        counter!(
            "stream_publisher_failed_total",
            "topic" => destination.to_string()
        )
        .increment(1);
    }

    /// Update the in-flight gauge
    pub fn in_flight(&self, count: u64) {
        gauge!("stream_publisher_in_flight").set(count as f64);
    }
}
