//! Admin-facing aggregate queries. Read-only rollups over the entity tables.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;

use super::DatabaseError;

/// Top-level platform counts for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformCounts {
    pub patients: i64,
    pub doctors: i64,
    pub verified_doctors: i64,
    pub pending_doctors: i64,
    pub appointments: i64,
    pub prescriptions: i64,
}

pub fn platform_counts(conn: &Connection) -> Result<PlatformCounts, DatabaseError> {
    let patients = count(conn, "SELECT COUNT(*) FROM patients")?;
    let doctors = count(conn, "SELECT COUNT(*) FROM doctors")?;
    let verified_doctors = count(conn, "SELECT COUNT(*) FROM doctors WHERE is_verified = 1")?;
    let appointments = count(conn, "SELECT COUNT(*) FROM appointments")?;
    let prescriptions = count(conn, "SELECT COUNT(*) FROM prescriptions")?;
    Ok(PlatformCounts {
        patients,
        doctors,
        verified_doctors,
        pending_doctors: doctors - verified_doctors,
        appointments,
        prescriptions,
    })
}

/// Appointment count per lifecycle status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

pub fn appointments_by_status(conn: &Connection) -> Result<Vec<StatusCount>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM appointments GROUP BY status ORDER BY status",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(StatusCount {
            status: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Appointment volume per day over an inclusive date range.
#[derive(Debug, Clone, Serialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub count: i64,
}

pub fn appointment_volume(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DailyVolume>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT date, COUNT(*) FROM appointments
         WHERE date >= ?1 AND date <= ?2
         GROUP BY date ORDER BY date",
    )?;
    let rows = stmt.query_map(params![from, to], |row| {
        Ok(DailyVolume {
            date: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Booked consultation fees for completed appointments in a date range.
pub fn completed_revenue(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<f64, DatabaseError> {
    let revenue = conn.query_row(
        "SELECT COALESCE(SUM(consultation_fee), 0) FROM appointments
         WHERE status = 'completed' AND date >= ?1 AND date <= ?2",
        params![from, to],
        |row| row.get(0),
    )?;
    Ok(revenue)
}

/// Busiest doctors by appointment count, capped at `limit`.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorLoad {
    pub doctor_id: String,
    pub doctor_name: String,
    pub appointments: i64,
}

pub fn busiest_doctors(conn: &Connection, limit: u32) -> Result<Vec<DoctorLoad>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.first_name || ' ' || d.last_name, COUNT(a.id) AS n
         FROM doctors d JOIN appointments a ON a.doctor_id = d.id
         GROUP BY d.id ORDER BY n DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(DoctorLoad {
            doctor_id: row.get(0)?,
            doctor_name: row.get(1)?,
            appointments: row.get(2)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Appointment count per doctor specialization.
#[derive(Debug, Clone, Serialize)]
pub struct SpecializationLoad {
    pub specialization: String,
    pub appointments: i64,
}

pub fn load_by_specialization(
    conn: &Connection,
) -> Result<Vec<SpecializationLoad>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(d.specialization, 'general'), COUNT(a.id) AS n
         FROM doctors d JOIN appointments a ON a.doctor_id = d.id
         GROUP BY 1 ORDER BY n DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SpecializationLoad {
            specialization: row.get(0)?,
            appointments: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn count(conn: &Connection, sql: &str) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}
