use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

/// Patient portal profile, one-to-one with a `User`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years at `today`.
    pub fn age_at(&self, today: NaiveDate) -> u32 {
        let mut age = today.years_since(self.date_of_birth).unwrap_or(0);
        if self.date_of_birth > today {
            age = 0;
        }
        age
    }
}
