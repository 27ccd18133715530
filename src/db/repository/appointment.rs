use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_uuid, to_json, DatabaseError};
use crate::models::enums::{
    AppointmentMode, AppointmentStatus, AppointmentType, CancelledBy, HistoryEvent, Priority,
};
use crate::models::{Appointment, AppointmentHistoryEntry};

/// Insert a booking. The partial unique index on (doctor_id, date, time)
/// rejects a second non-terminal row for the same slot, so callers racing
/// past the advisory conflict check still cannot double-book.
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, date, time, duration_minutes,
         type, mode, status, reason, symptoms, priority, patient_notes, doctor_notes,
         consultation_fee, cancelled_at, cancelled_by, cancellation_reason,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.date,
            appt.time,
            appt.duration_minutes,
            appt.appointment_type.as_str(),
            appt.mode.as_str(),
            appt.status.as_str(),
            appt.reason,
            to_json(&appt.symptoms),
            appt.priority.as_str(),
            appt.patient_notes,
            appt.doctor_notes,
            appt.consultation_fee,
            appt.cancelled_at,
            appt.cancelled_by.map(CancelledBy::as_str),
            appt.cancellation_reason,
            appt.created_at,
            appt.updated_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, patient_id, doctor_id, date, time, duration_minutes, \
     type, mode, status, reason, symptoms, priority, patient_notes, doctor_notes, \
     consultation_fee, cancelled_at, cancelled_by, cancellation_reason, created_at, updated_at";

pub fn get_appointment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(appointment_from_row).transpose()
}

/// True if a non-terminal appointment already holds (doctor, date, time).
/// `exclude` lets a reschedule skip the appointment being moved.
pub fn slot_taken(
    conn: &Connection,
    doctor_id: &Uuid,
    date: NaiveDate,
    time: &str,
    exclude: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let excluded = exclude.map(Uuid::to_string).unwrap_or_default();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE doctor_id = ?1 AND date = ?2 AND time = ?3
           AND status IN ('scheduled', 'confirmed')
           AND id != ?4",
        params![doctor_id.to_string(), date, time, excluded],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM appointments
         WHERE patient_id = ?1 ORDER BY date DESC, time DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    rows.map(|r| appointment_from_row(r?)).collect()
}

pub fn list_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
    date: Option<NaiveDate>,
) -> Result<Vec<Appointment>, DatabaseError> {
    match date {
        Some(d) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM appointments
                 WHERE doctor_id = ?1 AND date = ?2 ORDER BY time"
            ))?;
            let rows = stmt.query_map(params![doctor_id.to_string(), d], map_row)?;
            rows.map(|r| appointment_from_row(r?)).collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM appointments
                 WHERE doctor_id = ?1 ORDER BY date DESC, time DESC"
            ))?;
            let rows = stmt.query_map(params![doctor_id.to_string()], map_row)?;
            rows.map(|r| appointment_from_row(r?)).collect()
        }
    }
}

pub fn list_all(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM appointments ORDER BY date DESC, time DESC"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    rows.map(|r| appointment_from_row(r?)).collect()
}

/// Distinct patients a doctor has ever had an appointment with.
pub fn patient_ids_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT patient_id FROM appointments WHERE doctor_id = ?1",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string()], |row| {
        row.get::<_, String>(0)
    })?;
    rows.map(|r| parse_uuid("appointments.patient_id", &r?))
        .collect()
}

/// Move an appointment to a new slot, resetting status to `scheduled`.
/// The same partial index guards this path as the insert path.
pub fn move_slot(
    conn: &Connection,
    id: &Uuid,
    date: NaiveDate,
    time: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE appointments
             SET date = ?2, time = ?3, status = 'scheduled', updated_at = ?4
             WHERE id = ?1",
            params![id.to_string(), date, time, now],
        )
        .map_err(DatabaseError::from_sqlite)?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn set_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), status.as_str(), now],
        )
        .map_err(DatabaseError::from_sqlite)?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn record_cancellation(
    conn: &Connection,
    id: &Uuid,
    by: CancelledBy,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments
         SET status = 'cancelled', cancelled_at = ?2, cancelled_by = ?3,
             cancellation_reason = ?4, updated_at = ?2
         WHERE id = ?1",
        params![id.to_string(), now, by.as_str(), reason],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn set_doctor_notes(
    conn: &Connection,
    id: &Uuid,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET doctor_notes = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), notes, now],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn delete_appointment(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM appointments WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn not_found(id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "appointment".into(),
        id: id.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════
// Audit trail
// ═══════════════════════════════════════════════════════════

pub fn insert_history(
    conn: &Connection,
    appointment_id: &Uuid,
    event: HistoryEvent,
    old_date: Option<NaiveDate>,
    old_time: Option<&str>,
    detail: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_history (appointment_id, event, old_date, old_time,
         detail, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            appointment_id.to_string(),
            event.as_str(),
            old_date,
            old_time,
            detail,
            now,
        ],
    )?;
    Ok(())
}

pub fn history_for(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<AppointmentHistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, event, old_date, old_time, detail, recorded_at
         FROM appointment_history WHERE appointment_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<NaiveDate>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, DateTime<Utc>>(6)?,
        ))
    })?;
    rows.map(|r| {
        let (id, appt_id, event, old_date, old_time, detail, recorded_at) = r?;
        Ok(AppointmentHistoryEntry {
            id,
            appointment_id: parse_uuid("appointment_history.appointment_id", &appt_id)?,
            event: parse_enum("appointment_history.event", &event, HistoryEvent::from_str)?,
            old_date,
            old_time,
            detail,
            recorded_at,
        })
    })
    .collect()
}

// ═══════════════════════════════════════════════════════════
// Row mapping
// ═══════════════════════════════════════════════════════════

struct AppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    date: NaiveDate,
    time: String,
    duration_minutes: u32,
    appointment_type: String,
    mode: String,
    status: String,
    reason: String,
    symptoms: String,
    priority: String,
    patient_notes: Option<String>,
    doctor_notes: Option<String>,
    consultation_fee: f64,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        duration_minutes: row.get(5)?,
        appointment_type: row.get(6)?,
        mode: row.get(7)?,
        status: row.get(8)?,
        reason: row.get(9)?,
        symptoms: row.get(10)?,
        priority: row.get(11)?,
        patient_notes: row.get(12)?,
        doctor_notes: row.get(13)?,
        consultation_fee: row.get(14)?,
        cancelled_at: row.get(15)?,
        cancelled_by: row.get(16)?,
        cancellation_reason: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid("appointments.id", &row.id)?,
        patient_id: parse_uuid("appointments.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("appointments.doctor_id", &row.doctor_id)?,
        date: row.date,
        time: row.time,
        duration_minutes: row.duration_minutes,
        appointment_type: parse_enum(
            "appointments.type",
            &row.appointment_type,
            AppointmentType::from_str,
        )?,
        mode: parse_enum("appointments.mode", &row.mode, AppointmentMode::from_str)?,
        status: parse_enum(
            "appointments.status",
            &row.status,
            AppointmentStatus::from_str,
        )?,
        reason: row.reason,
        symptoms: from_json("appointments.symptoms", &row.symptoms)?,
        priority: parse_enum("appointments.priority", &row.priority, Priority::from_str)?,
        patient_notes: row.patient_notes,
        doctor_notes: row.doctor_notes,
        consultation_fee: row.consultation_fee,
        cancelled_at: row.cancelled_at,
        cancelled_by: row
            .cancelled_by
            .as_deref()
            .map(|s| parse_enum("appointments.cancelled_by", s, CancelledBy::from_str))
            .transpose()?,
        cancellation_reason: row.cancellation_reason,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
