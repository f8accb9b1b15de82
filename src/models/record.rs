use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RecordKind;

/// A summarized medical record entry, as produced by the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: Uuid,
    pub patient_id: String,
    pub kind: RecordKind,
    pub title: String,
    pub summary: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
