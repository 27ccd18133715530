use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PrescriptionStatus;

/// One line item on a prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescribedMedication {
    pub name: String,
    pub dosage: String,
    /// e.g. "twice daily".
    pub frequency: String,
    /// e.g. "7 days".
    pub duration: String,
    pub instructions: Option<String>,
}

/// A prescription written by a doctor for a patient, optionally tied to an
/// appointment. Plain CRUD — no cross-entity invariants beyond the two
/// foreign keys existing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub medications: Vec<PrescribedMedication>,
    pub notes: Option<String>,
    pub status: PrescriptionStatus,
    pub valid_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
