use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display};

/// Technician who performed the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub name: Option<String>,
    pub certification: Option<String>,
}

/// Severity as found in the source data: either a label or a numeric level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeverityLevel {
    Level(i64),
    Label(String),
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLevel::Level(level) => write!(f, "{level}"),
            SeverityLevel::Label(label) => f.write_str(label),
        }
    }
}

/// One equipment-maintenance record as read from the input file
///
/// Fields are optional so that an incomplete record fails on its own during
/// summarization instead of failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub record_id: Option<String>,
    pub equipment_id: Option<String>,
    pub equipment_type: Option<String>,
    pub location: Option<String>,
    pub service_date: Option<String>,
    pub service_type: Option<String>,
    pub reported_issue: Option<String>,
    pub diagnostic_findings: Option<String>,
    pub actions_taken: Option<String>,
    pub post_service_notes: Option<String>,
    pub severity_level: Option<SeverityLevel>,
    pub service_duration_minutes: Option<i64>,
    pub technician: Option<Technician>,
}

/// Document persisted per record, keyed by `record_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    pub record_id: String,
    pub equipment_id: Option<String>,
    pub equipment_type: Option<String>,
    pub location: Option<String>,
    pub service_date: Option<String>,
    pub service_type: Option<String>,
    pub reported_issue: Option<String>,
    pub diagnostic_findings: Option<String>,
    pub actions_taken: Option<String>,
    pub post_service_notes: Option<String>,
    pub severity_level: Option<SeverityLevel>,
    pub summary: String,
    pub embeddings: Vec<f64>,
}

impl EmbeddedDocument {
    /// Project a record onto the stored layout
    pub fn from_record(
        record_id: String,
        record: MaintenanceRecord,
        summary: String,
        embeddings: Vec<f64>,
    ) -> Self {
        Self {
            record_id,
            equipment_id: record.equipment_id,
            equipment_type: record.equipment_type,
            location: record.location,
            service_date: record.service_date,
            service_type: record.service_type,
            reported_issue: record.reported_issue,
            diagnostic_findings: record.diagnostic_findings,
            actions_taken: record.actions_taken,
            post_service_notes: record.post_service_notes,
            severity_level: record.severity_level,
            summary,
            embeddings,
        }
    }
}

/// Whether an upsert created the document or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_accepts_label_and_level() {
        let label: SeverityLevel = serde_json::from_value(json!("High")).unwrap();
        let level: SeverityLevel = serde_json::from_value(json!(3)).unwrap();

        assert_eq!(label, SeverityLevel::Label("High".to_string()));
        assert_eq!(level, SeverityLevel::Level(3));
        assert_eq!(label.to_string(), "High");
        assert_eq!(level.to_string(), "3");
    }

    #[test]
    fn test_record_ignores_unknown_fields_and_tolerates_missing_ones() {
        let record: MaintenanceRecord = serde_json::from_value(json!({
            "record_id": "MLOG-0001",
            "equipment_type": "Centrifugal Pump",
            "parts_replaced": ["seal kit"]
        }))
        .unwrap();

        assert_eq!(record.record_id.as_deref(), Some("MLOG-0001"));
        assert_eq!(record.location, None);
        assert_eq!(record.technician, None);
    }

    #[test]
    fn test_record_rejects_wrong_field_type() {
        let result = serde_json::from_value::<MaintenanceRecord>(json!({
            "record_id": "MLOG-0002",
            "service_duration_minutes": "ninety"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_document_projection_keeps_listed_fields() {
        let record = MaintenanceRecord {
            record_id: Some("MLOG-0003".to_string()),
            equipment_id: Some("EQ-17".to_string()),
            service_duration_minutes: Some(45),
            technician: Some(Technician::default()),
            ..Default::default()
        };

        let document = EmbeddedDocument::from_record("MLOG-0003".to_string(), record, "summary".to_string(), vec![0.5]);
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["record_id"], "MLOG-0003");
        assert_eq!(value["equipment_id"], "EQ-17");
        assert!(value.get("technician").is_none());
        assert!(value.get("service_duration_minutes").is_none());
        assert_eq!(value["embeddings"], json!([0.5]));
    }

    #[test]
    fn test_upsert_outcome_labels() {
        assert_eq!(UpsertOutcome::Inserted.to_string(), "inserted");
        assert_eq!(UpsertOutcome::Updated.as_ref(), "updated");
    }
}
