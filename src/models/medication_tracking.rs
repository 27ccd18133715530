use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MedicationSlot;

/// One tracked dose for one day. Unique per
/// (patient, date, medication, slot); toggling flips `taken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub medication_name: String,
    pub slot: MedicationSlot,
    pub taken: bool,
    pub updated_at: DateTime<Utc>,
}

/// Adherence over a date range.
#[derive(Debug, Clone, Serialize)]
pub struct AdherenceSummary {
    pub total_doses: u32,
    pub taken_doses: u32,
    pub adherence_percent: f64,
}

impl AdherenceSummary {
    pub fn new(total_doses: u32, taken_doses: u32) -> Self {
        let adherence_percent = if total_doses == 0 {
            0.0
        } else {
            (taken_doses as f64 / total_doses as f64) * 100.0
        };
        Self {
            total_doses,
            taken_doses,
            adherence_percent,
        }
    }
}
