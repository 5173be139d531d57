//! Record summarizer
//!
//! Renders a record into the single text block that gets embedded. The
//! wording is fixed; the same record always yields the same bytes.

use std::fmt;

use crate::error::{MaintenanceError, MaintenanceResult};
use crate::models::MaintenanceRecord;

/// Deterministic text rendering of one record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Summary(String);

impl Summary {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn required<'a, T>(value: &'a Option<T>, field: &str) -> MaintenanceResult<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| MaintenanceError::MissingField(field.to_string()))
}

/// Build the summary for `record`, or name the first missing field
pub fn summarize(record: &MaintenanceRecord) -> MaintenanceResult<Summary> {
    let equipment_type = required(&record.equipment_type, "equipment_type")?;
    let location = required(&record.location, "location")?;
    let reported_issue = required(&record.reported_issue, "reported_issue")?;
    let diagnostic_findings = required(&record.diagnostic_findings, "diagnostic_findings")?;
    let actions_taken = required(&record.actions_taken, "actions_taken")?;
    let post_service_notes = required(&record.post_service_notes, "post_service_notes")?;
    let technician = required(&record.technician, "technician")?;
    let technician_name = required(&technician.name, "technician.name")?;
    let certification = required(&technician.certification, "technician.certification")?;
    let severity_level = required(&record.severity_level, "severity_level")?;
    let duration = required(&record.service_duration_minutes, "service_duration_minutes")?;

    Ok(Summary(format!(
        "Maintenance log for equipment '{equipment_type}' located in {location}:\n\
         \n\
         Reported Issue: {reported_issue}\n\
         Diagnostic Findings: {diagnostic_findings}\n\
         Actions Taken: {actions_taken}\n\
         Post-Service Notes: {post_service_notes}\n\
         \n\
         Service performed by {technician_name} ({certification}).\n\
         Severity Level: {severity_level}, Duration: {duration} minutes."
    )))
}
