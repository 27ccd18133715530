use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_uuid, to_json, DatabaseError};
use crate::models::enums::Gender;
use crate::models::{ConsultationFee, Doctor, ShiftSlot, UnavailableDate};

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, user_id, first_name, last_name, phone, date_of_birth,
         gender, specialization, license_number, experience_years,
         consultation_fee_in_person, consultation_fee_online, consultation_fee_follow_up,
         schedule, unavailable_dates, is_verified, verified_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            doctor.id.to_string(),
            doctor.user_id.to_string(),
            doctor.first_name,
            doctor.last_name,
            doctor.phone,
            doctor.date_of_birth,
            doctor.gender.as_str(),
            doctor.specialization,
            doctor.license_number,
            doctor.experience_years,
            doctor.consultation_fee.in_person,
            doctor.consultation_fee.online,
            doctor.consultation_fee.follow_up,
            to_json(&doctor.schedule),
            to_json(&doctor.unavailable_dates),
            doctor.is_verified as i32,
            doctor.verified_at,
            doctor.created_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, user_id, first_name, last_name, phone, date_of_birth, \
     gender, specialization, license_number, experience_years, \
     consultation_fee_in_person, consultation_fee_online, consultation_fee_follow_up, \
     schedule, unavailable_dates, is_verified, verified_at, created_at";

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM doctors WHERE id = ?1"),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}

pub fn get_doctor_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM doctors WHERE user_id = ?1"),
            params![user_id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}

pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM doctors ORDER BY last_name, first_name"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    rows.map(|r| doctor_from_row(r?)).collect()
}

/// Verified doctors only, optionally filtered by name or specialization
/// substring. This backs the patient portal's doctor search.
pub fn search_verified(
    conn: &Connection,
    query: Option<&str>,
) -> Result<Vec<Doctor>, DatabaseError> {
    let pattern = format!("%{}%", query.unwrap_or("").trim());
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM doctors
         WHERE is_verified = 1
           AND (first_name LIKE ?1 COLLATE NOCASE
                OR last_name LIKE ?1 COLLATE NOCASE
                OR COALESCE(specialization, '') LIKE ?1 COLLATE NOCASE)
         ORDER BY last_name, first_name"
    ))?;
    let rows = stmt.query_map(params![pattern], map_row)?;
    rows.map(|r| doctor_from_row(r?)).collect()
}

/// Doctors awaiting admin verification, oldest first.
pub fn list_unverified(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM doctors WHERE is_verified = 0 ORDER BY created_at"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    rows.map(|r| doctor_from_row(r?)).collect()
}

pub fn set_verified(
    conn: &Connection,
    id: &Uuid,
    verified: bool,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET is_verified = ?2, verified_at = ?3 WHERE id = ?1",
        params![
            id.to_string(),
            verified as i32,
            verified.then_some(now),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Doctor-editable profile fields. Verification state is admin-only and
/// goes through `set_verified`.
pub struct DoctorUpdate {
    pub phone: String,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: u32,
    pub consultation_fee: ConsultationFee,
}

pub fn update_doctor(
    conn: &Connection,
    id: &Uuid,
    update: &DoctorUpdate,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET phone = ?2, specialization = ?3, license_number = ?4,
         experience_years = ?5, consultation_fee_in_person = ?6,
         consultation_fee_online = ?7, consultation_fee_follow_up = ?8
         WHERE id = ?1",
        params![
            id.to_string(),
            update.phone,
            update.specialization,
            update.license_number,
            update.experience_years,
            update.consultation_fee.in_person,
            update.consultation_fee.online,
            update.consultation_fee.follow_up,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_schedule(
    conn: &Connection,
    id: &Uuid,
    schedule: &[ShiftSlot],
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET schedule = ?2 WHERE id = ?1",
        params![id.to_string(), to_json(&schedule)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_unavailable_dates(
    conn: &Connection,
    id: &Uuid,
    dates: &[UnavailableDate],
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET unavailable_dates = ?2 WHERE id = ?1",
        params![id.to_string(), to_json(&dates)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "doctor".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct DoctorRow {
    id: String,
    user_id: String,
    first_name: String,
    last_name: String,
    phone: String,
    date_of_birth: NaiveDate,
    gender: String,
    specialization: Option<String>,
    license_number: Option<String>,
    experience_years: u32,
    fee_in_person: f64,
    fee_online: Option<f64>,
    fee_follow_up: Option<f64>,
    schedule: String,
    unavailable_dates: String,
    is_verified: i32,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DoctorRow> {
    Ok(DoctorRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        phone: row.get(4)?,
        date_of_birth: row.get(5)?,
        gender: row.get(6)?,
        specialization: row.get(7)?,
        license_number: row.get(8)?,
        experience_years: row.get(9)?,
        fee_in_person: row.get(10)?,
        fee_online: row.get(11)?,
        fee_follow_up: row.get(12)?,
        schedule: row.get(13)?,
        unavailable_dates: row.get(14)?,
        is_verified: row.get(15)?,
        verified_at: row.get(16)?,
        created_at: row.get(17)?,
    })
}

fn doctor_from_row(row: DoctorRow) -> Result<Doctor, DatabaseError> {
    Ok(Doctor {
        id: parse_uuid("doctors.id", &row.id)?,
        user_id: parse_uuid("doctors.user_id", &row.user_id)?,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        date_of_birth: row.date_of_birth,
        gender: parse_enum("doctors.gender", &row.gender, Gender::from_str)?,
        specialization: row.specialization,
        license_number: row.license_number,
        experience_years: row.experience_years,
        consultation_fee: ConsultationFee {
            in_person: row.fee_in_person,
            online: row.fee_online,
            follow_up: row.fee_follow_up,
        },
        schedule: from_json("doctors.schedule", &row.schedule)?,
        unavailable_dates: from_json("doctors.unavailable_dates", &row.unavailable_dates)?,
        is_verified: row.is_verified != 0,
        verified_at: row.verified_at,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::testutil::seed_doctor;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    #[test]
    fn round_trip_preserves_fee_and_flags() {
        let conn = open_memory_database().unwrap();
        let (user, doctor) = seed_doctor(&conn, "ravi", true);

        let loaded = get_doctor(&conn, &doctor.id).unwrap().unwrap();
        assert_eq!(loaded.consultation_fee.in_person, 500.0);
        assert!(loaded.is_verified);
        assert!(loaded.verified_at.is_some());

        let by_user = get_doctor_by_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(by_user.id, doctor.id);
    }

    #[test]
    fn search_only_returns_verified() {
        let conn = open_memory_database().unwrap();
        seed_doctor(&conn, "verified1", true);
        seed_doctor(&conn, "pending1", false);

        let all = search_verified(&conn, None).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_verified);

        let pending = list_unverified(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].is_verified);
    }

    #[test]
    fn search_matches_specialization_case_insensitive() {
        let conn = open_memory_database().unwrap();
        seed_doctor(&conn, "ravi", true);

        assert_eq!(search_verified(&conn, Some("cardio")).unwrap().len(), 1);
        assert_eq!(search_verified(&conn, Some("menon")).unwrap().len(), 1);
        assert!(search_verified(&conn, Some("dermat")).unwrap().is_empty());
    }

    #[test]
    fn verify_sets_and_clears_timestamp() {
        let conn = open_memory_database().unwrap();
        let (_, doctor) = seed_doctor(&conn, "pending", false);

        set_verified(&conn, &doctor.id, true, Utc::now()).unwrap();
        let loaded = get_doctor(&conn, &doctor.id).unwrap().unwrap();
        assert!(loaded.is_verified);
        assert!(loaded.verified_at.is_some());

        set_verified(&conn, &doctor.id, false, Utc::now()).unwrap();
        let loaded = get_doctor(&conn, &doctor.id).unwrap().unwrap();
        assert!(!loaded.is_verified);
        assert!(loaded.verified_at.is_none());
    }

    #[test]
    fn schedule_round_trips_through_json() {
        let conn = open_memory_database().unwrap();
        let (_, doctor) = seed_doctor(&conn, "ravi", true);

        let shifts = vec![ShiftSlot {
            day: "monday".into(),
            start_time: "09:00".into(),
            end_time: "13:00".into(),
            slot_minutes: 30,
        }];
        update_schedule(&conn, &doctor.id, &shifts).unwrap();

        let loaded = get_doctor(&conn, &doctor.id).unwrap().unwrap();
        assert_eq!(loaded.schedule.len(), 1);
        assert_eq!(loaded.schedule[0].day, "monday");
    }
}
