use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

/// Fee schedule for a doctor. The in-person fee is snapshotted onto every
/// appointment at booking time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultationFee {
    pub in_person: f64,
    pub online: Option<f64>,
    pub follow_up: Option<f64>,
}

/// One recurring weekly shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSlot {
    /// Lowercase weekday name ("monday" .. "sunday").
    pub day: String,
    /// 24-hour "HH:MM".
    pub start_time: String,
    pub end_time: String,
    pub slot_minutes: u32,
}

/// A blocked-out calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableDate {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

/// Doctor portal profile. Starts unverified; only an admin flips
/// `is_verified`, and unverified doctors cannot log in or take bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: u32,
    pub consultation_fee: ConsultationFee,
    pub schedule: Vec<ShiftSlot>,
    pub unavailable_dates: Vec<UnavailableDate>,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
