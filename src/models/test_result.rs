use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TestStatus;

/// A single measured value within a test result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestValue {
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    /// "normal", "high", "low" — free-form flag from the recording doctor.
    pub flag: Option<String>,
}

/// A test result recorded by a doctor for a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub test_name: String,
    pub test_type: String,
    pub summary: Option<String>,
    pub values: Vec<TestValue>,
    pub status: TestStatus,
    pub test_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}
