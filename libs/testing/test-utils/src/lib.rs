//! Shared test utilities for domain testing
//!
//! This crate provides reusable test infrastructure for the domain crates:
//! - `TestMongo`: MongoDB container with automatic cleanup (feature: "mongo")
//! - `TestDataBuilder`: Deterministic maintenance-record generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_mongo_test");
//!
//!     let db = mongo.database(&builder.name("db", "main"));
//!     let record = builder.maintenance_record(1);
//! }
//! ```

use serde_json::{Value, json};

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

const EQUIPMENT: &[(&str, &str)] = &[
    ("Centrifugal Pump", "Pump overheating under sustained load"),
    ("Air Compressor", "Discharge pressure dropping below setpoint"),
    ("Conveyor Belt", "Belt tracking off-center"),
    ("HVAC Chiller", "High condenser pressure alarm"),
];

const SEVERITIES: &[&str] = &["Low", "Medium", "High", "Critical"];

/// Builder for test data with deterministic variation
///
/// The same seed always yields the same records.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_ingest_batch");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique name for testing
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(12345);
    /// assert_eq!(builder.name("db", "main"), "test-db-12345-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Record identifier for the `n`th record of this builder
    pub fn record_id(&self, n: usize) -> String {
        format!("MLOG-{:04}-{:04}", self.seed % 10_000, n)
    }

    /// A complete maintenance record as it appears in the input file
    pub fn maintenance_record(&self, n: usize) -> Value {
        let pick = (self.seed as usize).wrapping_add(n);
        let (equipment_type, issue) = EQUIPMENT[pick % EQUIPMENT.len()];
        let severity = SEVERITIES[pick % SEVERITIES.len()];

        json!({
            "record_id": self.record_id(n),
            "equipment_id": format!("EQ-{:03}", pick % 1000),
            "equipment_type": equipment_type,
            "location": format!("Plant {} - Bay {}", (b'A' + (pick % 3) as u8) as char, n + 1),
            "service_date": format!("2024-{:02}-{:02}", pick % 12 + 1, pick % 28 + 1),
            "service_type": if n % 2 == 0 { "Corrective" } else { "Preventive" },
            "reported_issue": issue,
            "diagnostic_findings": "Worn component identified during inspection",
            "actions_taken": "Replaced worn component and recalibrated",
            "post_service_notes": "Operating within normal parameters",
            "severity_level": severity,
            "service_duration_minutes": 30 + (pick % 8) * 15,
            "technician": {
                "name": format!("Technician {}", pick % 50),
                "certification": "CMRT"
            }
        })
    }

    /// `count` records numbered from 1
    pub fn maintenance_records(&self, count: usize) -> Vec<Value> {
        (1..=count).map(|n| self.maintenance_record(n)).collect()
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert that two float slices match within `tolerance`
    pub fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64, context: &str) {
        assert_eq!(
            actual.len(),
            expected.len(),
            "{}: expected {} values, got {}",
            context,
            expected.len(),
            actual.len()
        );
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!(
                (a - e).abs() <= tolerance,
                "{}: value {} differs: expected {}, got {}",
                context,
                i,
                e,
                a
            );
        }
    }
}
