use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_uuid, to_json, DatabaseError};
use crate::models::enums::PrescriptionStatus;
use crate::models::Prescription;

pub fn insert_prescription(
    conn: &Connection,
    prescription: &Prescription,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, patient_id, doctor_id, appointment_id, diagnosis,
         medications, notes, status, valid_until, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            prescription.id.to_string(),
            prescription.patient_id.to_string(),
            prescription.doctor_id.to_string(),
            prescription.appointment_id.map(|id| id.to_string()),
            prescription.diagnosis,
            to_json(&prescription.medications),
            prescription.notes,
            prescription.status.as_str(),
            prescription.valid_until,
            prescription.created_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, patient_id, doctor_id, appointment_id, diagnosis, \
     medications, notes, status, valid_until, created_at";

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM prescriptions WHERE id = ?1"),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(prescription_from_row).transpose()
}

pub fn list_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM prescriptions
         WHERE patient_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    rows.map(|r| prescription_from_row(r?)).collect()
}

pub fn list_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM prescriptions
         WHERE doctor_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], map_row)?;
    rows.map(|r| prescription_from_row(r?)).collect()
}

pub fn set_status(
    conn: &Connection,
    id: &Uuid,
    status: PrescriptionStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "prescription".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct PrescriptionRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    appointment_id: Option<String>,
    diagnosis: String,
    medications: String,
    notes: Option<String>,
    status: String,
    valid_until: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_id: row.get(3)?,
        diagnosis: row.get(4)?,
        medications: row.get(5)?,
        notes: row.get(6)?,
        status: row.get(7)?,
        valid_until: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    Ok(Prescription {
        id: parse_uuid("prescriptions.id", &row.id)?,
        patient_id: parse_uuid("prescriptions.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("prescriptions.doctor_id", &row.doctor_id)?,
        appointment_id: row
            .appointment_id
            .as_deref()
            .map(|s| parse_uuid("prescriptions.appointment_id", s))
            .transpose()?,
        diagnosis: row.diagnosis,
        medications: from_json("prescriptions.medications", &row.medications)?,
        notes: row.notes,
        status: parse_enum(
            "prescriptions.status",
            &row.status,
            PrescriptionStatus::from_str,
        )?,
        valid_until: row.valid_until,
        created_at: row.created_at,
    })
}
