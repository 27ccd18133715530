//! Plain-function repositories over `rusqlite::Connection`, one file per
//! entity. UUIDs and enums are stored as TEXT; list-shaped fields as JSON.

pub mod admin;
pub mod appointment;
pub mod doctor;
pub mod health_tip;
pub mod medication_tracking;
pub mod patient;
pub mod prescription;
pub mod reports;
pub mod settings;
pub mod test_result;
pub mod user;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::DatabaseError;

/// Serialize a list-shaped field into its TEXT column.
pub(crate) fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

/// Parse a JSON TEXT column.
pub(crate) fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::InvalidJson {
        column: column.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a TEXT uuid column.
pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|_| DatabaseError::InvalidEnum {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// Parse an enum TEXT column via its `from_str`.
pub(crate) fn parse_enum<T>(
    field: &str,
    raw: &str,
    parser: fn(&str) -> Option<T>,
) -> Result<T, DatabaseError> {
    parser(raw).ok_or_else(|| DatabaseError::InvalidEnum {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

// ═══════════════════════════════════════════════════════════
// Shared test fixtures
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{NaiveDate, Utc};
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::models::enums::{Gender, Portal};
    use crate::models::{Admin, AdminPermissions, ConsultationFee, Doctor, Patient, User};

    pub fn make_user(portal: Portal, tag: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{tag}@example.com"),
            username: tag.to_string(),
            portal,
            password_hash: "$pbkdf2-sha256$test".to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn seed_patient(conn: &Connection, tag: &str) -> (User, Patient) {
        let user = make_user(Portal::Patient, tag);
        super::user::insert_user(conn, &user).unwrap();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id: user.id,
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            phone: "9876543210".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 20).unwrap(),
            gender: Gender::Female,
            blood_group: Some("O+".into()),
            address: None,
            city: None,
            emergency_contact: None,
            allergies: vec![],
            chronic_conditions: vec![],
            created_at: Utc::now(),
        };
        super::patient::insert_patient(conn, &patient).unwrap();
        (user, patient)
    }

    pub fn seed_doctor(conn: &Connection, tag: &str, verified: bool) -> (User, Doctor) {
        let user = make_user(Portal::Doctor, tag);
        super::user::insert_user(conn, &user).unwrap();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id: user.id,
            first_name: "Ravi".into(),
            last_name: "Menon".into(),
            phone: "9123456780".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 15).unwrap(),
            gender: Gender::Male,
            specialization: Some("Cardiology".into()),
            license_number: Some(format!("LIC-{tag}")),
            experience_years: 12,
            consultation_fee: ConsultationFee {
                in_person: 500.0,
                online: Some(300.0),
                follow_up: Some(200.0),
            },
            schedule: vec![],
            unavailable_dates: vec![],
            is_verified: verified,
            verified_at: verified.then(Utc::now),
            created_at: Utc::now(),
        };
        super::doctor::insert_doctor(conn, &doctor).unwrap();
        (user, doctor)
    }

    pub fn seed_admin(conn: &Connection, tag: &str) -> (User, Admin) {
        let user = make_user(Portal::Admin, tag);
        super::user::insert_user(conn, &user).unwrap();
        let admin = Admin {
            id: Uuid::new_v4(),
            user_id: user.id,
            first_name: "Ira".into(),
            last_name: "Shah".into(),
            department: "Operations".into(),
            position: "Manager".into(),
            permissions: AdminPermissions::default(),
            created_at: Utc::now(),
        };
        super::admin::insert_admin(conn, &admin).unwrap();
        (user, admin)
    }
}
