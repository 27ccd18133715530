use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_uuid, to_json, DatabaseError};
use crate::models::enums::Gender;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, user_id, first_name, last_name, phone, date_of_birth,
         gender, blood_group, address, city, emergency_contact, allergies,
         chronic_conditions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            patient.id.to_string(),
            patient.user_id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.phone,
            patient.date_of_birth,
            patient.gender.as_str(),
            patient.blood_group,
            patient.address,
            patient.city,
            patient.emergency_contact,
            to_json(&patient.allergies),
            to_json(&patient.chronic_conditions),
            patient.created_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, user_id, first_name, last_name, phone, date_of_birth, \
     gender, blood_group, address, city, emergency_contact, allergies, \
     chronic_conditions, created_at";

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

pub fn get_patient_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM patients WHERE user_id = ?1"),
            params![user_id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM patients ORDER BY last_name, first_name"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    rows.map(|r| patient_from_row(r?)).collect()
}

/// Patient-editable contact/health fields. Name, DOB and gender are fixed
/// at signup.
pub struct PatientUpdate {
    pub phone: String,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
}

pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    update: &PatientUpdate,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET phone = ?2, blood_group = ?3, address = ?4, city = ?5,
         emergency_contact = ?6, allergies = ?7, chronic_conditions = ?8
         WHERE id = ?1",
        params![
            id.to_string(),
            update.phone,
            update.blood_group,
            update.address,
            update.city,
            update.emergency_contact,
            to_json(&update.allergies),
            to_json(&update.chronic_conditions),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct PatientRow {
    id: String,
    user_id: String,
    first_name: String,
    last_name: String,
    phone: String,
    date_of_birth: NaiveDate,
    gender: String,
    blood_group: Option<String>,
    address: Option<String>,
    city: Option<String>,
    emergency_contact: Option<String>,
    allergies: String,
    chronic_conditions: String,
    created_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        phone: row.get(4)?,
        date_of_birth: row.get(5)?,
        gender: row.get(6)?,
        blood_group: row.get(7)?,
        address: row.get(8)?,
        city: row.get(9)?,
        emergency_contact: row.get(10)?,
        allergies: row.get(11)?,
        chronic_conditions: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid("patients.id", &row.id)?,
        user_id: parse_uuid("patients.user_id", &row.user_id)?,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        date_of_birth: row.date_of_birth,
        gender: parse_enum("patients.gender", &row.gender, Gender::from_str)?,
        blood_group: row.blood_group,
        address: row.address,
        city: row.city,
        emergency_contact: row.emergency_contact,
        allergies: from_json("patients.allergies", &row.allergies)?,
        chronic_conditions: from_json("patients.chronic_conditions", &row.chronic_conditions)?,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::testutil::seed_patient;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn round_trip_by_id_and_user() {
        let conn = open_memory_database().unwrap();
        let (user, patient) = seed_patient(&conn, "asha");

        let by_id = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(by_id.full_name(), "Asha Rao");

        let by_user = get_patient_by_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(by_user.id, patient.id);
    }

    #[test]
    fn update_replaces_editable_fields() {
        let conn = open_memory_database().unwrap();
        let (_, patient) = seed_patient(&conn, "asha");

        update_patient(
            &conn,
            &patient.id,
            &PatientUpdate {
                phone: "9000000000".into(),
                blood_group: Some("A-".into()),
                address: Some("12 Hill Road".into()),
                city: Some("Pune".into()),
                emergency_contact: None,
                allergies: vec!["penicillin".into()],
                chronic_conditions: vec![],
            },
        )
        .unwrap();

        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(loaded.phone, "9000000000");
        assert_eq!(loaded.allergies, vec!["penicillin".to_string()]);
        // Identity fields untouched
        assert_eq!(loaded.first_name, "Asha");
    }

    #[test]
    fn deleting_user_cascades_to_profile() {
        let conn = open_memory_database().unwrap();
        let (user, patient) = seed_patient(&conn, "asha");

        crate::db::repository::user::delete_user(&conn, &user.id).unwrap();
        assert!(get_patient(&conn, &patient.id).unwrap().is_none());
    }
}
