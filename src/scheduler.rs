//! Appointment scheduling: booking, cancellation, reschedule and status
//! transitions. All clock-dependent rules take an explicit `now` so the
//! lead-time window is testable.
//!
//! Slot identity is (doctor, date, time). The advisory conflict check gives
//! friendly errors; the storage layer's partial unique index is the actual
//! guarantee, so two racing bookings can never both commit.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::appointment as appointment_repo;
use crate::db::repository::doctor as doctor_repo;
use crate::db::DatabaseError;
use crate::models::enums::{
    AppointmentMode, AppointmentStatus, AppointmentType, CancelledBy, HistoryEvent, Priority,
};
use crate::models::{Appointment, MODIFY_LEAD_TIME_HOURS};
use rusqlite::Connection;

pub const MAX_REASON_LENGTH: usize = 500;
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("{0}")]
    Validation(String),

    #[error("doctor is not available for booking")]
    DoctorUnavailable,

    #[error("appointment not found")]
    NotFound,

    #[error("the selected slot is already booked")]
    SlotConflict,

    #[error("the selected date is in the past")]
    PastSlot,

    #[error("appointments can only be cancelled at least {MODIFY_LEAD_TIME_HOURS} hours in advance")]
    CannotCancel,

    #[error("appointments can only be rescheduled at least {MODIFY_LEAD_TIME_HOURS} hours in advance")]
    CannotReschedule,

    #[error("appointment status does not allow this transition")]
    InvalidTransition,

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for SchedulerError {
    fn from(err: DatabaseError) -> Self {
        // A unique-index failure on the slot guard is a booking conflict,
        // not an internal fault.
        if err.is_unique_violation("idx_appointments_slot") {
            SchedulerError::SlotConflict
        } else {
            SchedulerError::Database(err)
        }
    }
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap_or_else(|_| unreachable!()))
}

fn validate_time(time: &str) -> Result<(), SchedulerError> {
    if time_pattern().is_match(time) {
        Ok(())
    } else {
        Err(SchedulerError::Validation(
            "time must be 24-hour HH:MM".into(),
        ))
    }
}

/// What a patient submits to book a slot.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub appointment_type: AppointmentType,
    pub mode: AppointmentMode,
    pub reason: String,
    pub symptoms: Vec<String>,
    pub priority: Priority,
    pub patient_notes: Option<String>,
    pub duration_minutes: Option<u32>,
}

/// Book an appointment for a patient. The doctor's current in-person fee is
/// snapshotted onto the appointment; later fee edits do not reprice it.
pub fn book(
    conn: &Connection,
    patient_id: &Uuid,
    request: &BookingRequest,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulerError> {
    validate_time(&request.time)?;
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(SchedulerError::Validation("reason is required".into()));
    }
    // Character cap, not bytes: multibyte reasons of the stated length pass.
    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(SchedulerError::Validation(format!(
            "reason must be at most {MAX_REASON_LENGTH} characters"
        )));
    }
    // Date-only comparison: same-day bookings are allowed.
    if request.date < now.date() {
        return Err(SchedulerError::PastSlot);
    }

    let doctor = doctor_repo::get_doctor(conn, &request.doctor_id)?
        .ok_or(SchedulerError::DoctorUnavailable)?;
    if !doctor.is_verified {
        return Err(SchedulerError::DoctorUnavailable);
    }

    // Advisory pre-check for a friendly error; the unique index is the
    // real guard.
    if appointment_repo::slot_taken(conn, &doctor.id, request.date, &request.time, None)? {
        return Err(SchedulerError::SlotConflict);
    }

    let created_at = Utc::now();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        doctor_id: doctor.id,
        date: request.date,
        time: request.time.clone(),
        duration_minutes: request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
        appointment_type: request.appointment_type,
        mode: request.mode,
        status: AppointmentStatus::Scheduled,
        reason: reason.to_string(),
        symptoms: request.symptoms.clone(),
        priority: request.priority,
        patient_notes: request.patient_notes.clone(),
        doctor_notes: None,
        consultation_fee: doctor.consultation_fee.in_person,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        created_at,
        updated_at: created_at,
    };
    appointment_repo::insert_appointment(conn, &appointment)?;
    appointment_repo::insert_history(
        conn,
        &appointment.id,
        HistoryEvent::Booked,
        None,
        None,
        None,
        created_at,
    )?;

    tracing::info!(
        appointment = %appointment.id,
        doctor = %doctor.id,
        date = %request.date,
        time = %request.time,
        "appointment booked"
    );
    Ok(appointment)
}

/// Cancel an appointment, recording who cancelled and why. Refused inside
/// the lead-time window and on terminal appointments.
pub fn cancel(
    conn: &Connection,
    appointment_id: &Uuid,
    by: CancelledBy,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulerError> {
    let appointment = appointment_repo::get_appointment(conn, appointment_id)?
        .ok_or(SchedulerError::NotFound)?;
    if !appointment.can_modify(now) {
        return Err(SchedulerError::CannotCancel);
    }

    let recorded_at = Utc::now();
    appointment_repo::record_cancellation(conn, appointment_id, by, reason, recorded_at)?;
    appointment_repo::insert_history(
        conn,
        appointment_id,
        HistoryEvent::Cancelled,
        None,
        None,
        Some(by.as_str()),
        recorded_at,
    )?;

    tracing::info!(appointment = %appointment_id, by = %by.as_str(), "appointment cancelled");
    appointment_repo::get_appointment(conn, appointment_id)?.ok_or(SchedulerError::NotFound)
}

/// Move an appointment to a new slot. Subject to the same lead-time window
/// as cancellation; status resets to `scheduled` so a previously confirmed
/// appointment needs re-confirmation at the new time.
pub fn reschedule(
    conn: &Connection,
    appointment_id: &Uuid,
    new_date: NaiveDate,
    new_time: &str,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulerError> {
    validate_time(new_time)?;
    let appointment = appointment_repo::get_appointment(conn, appointment_id)?
        .ok_or(SchedulerError::NotFound)?;
    if !appointment.can_modify(now) {
        return Err(SchedulerError::CannotReschedule);
    }
    if new_date < now.date() {
        return Err(SchedulerError::PastSlot);
    }
    // Exclude the appointment itself so keeping the same slot is a no-op,
    // not a self-conflict.
    if appointment_repo::slot_taken(
        conn,
        &appointment.doctor_id,
        new_date,
        new_time,
        Some(appointment_id),
    )? {
        return Err(SchedulerError::SlotConflict);
    }

    let recorded_at = Utc::now();
    appointment_repo::move_slot(conn, appointment_id, new_date, new_time, recorded_at)?;
    // The audit row keeps the prior slot and the stated reason for moving.
    appointment_repo::insert_history(
        conn,
        appointment_id,
        HistoryEvent::Rescheduled,
        Some(appointment.date),
        Some(&appointment.time),
        reason.map(str::trim).filter(|r| !r.is_empty()),
        recorded_at,
    )?;

    tracing::info!(
        appointment = %appointment_id,
        old = %format!("{} {}", appointment.date, appointment.time),
        new = %format!("{new_date} {new_time}"),
        "appointment rescheduled"
    );
    appointment_repo::get_appointment(conn, appointment_id)?.ok_or(SchedulerError::NotFound)
}

/// Mark an appointment completed, optionally attaching the doctor's notes.
pub fn complete(
    conn: &Connection,
    appointment_id: &Uuid,
    doctor_notes: Option<&str>,
) -> Result<Appointment, SchedulerError> {
    let appointment = appointment_repo::get_appointment(conn, appointment_id)?
        .ok_or(SchedulerError::NotFound)?;
    if appointment.status.is_terminal() {
        return Err(SchedulerError::InvalidTransition);
    }

    let recorded_at = Utc::now();
    if let Some(notes) = doctor_notes {
        appointment_repo::set_doctor_notes(conn, appointment_id, notes, recorded_at)?;
    }
    appointment_repo::set_status(conn, appointment_id, AppointmentStatus::Completed, recorded_at)?;
    appointment_repo::insert_history(
        conn,
        appointment_id,
        HistoryEvent::Completed,
        None,
        None,
        None,
        recorded_at,
    )?;
    appointment_repo::get_appointment(conn, appointment_id)?.ok_or(SchedulerError::NotFound)
}

/// Admin override of appointment status. Transitions out of a terminal
/// state are refused; cancellation through here is attributed to the admin.
pub fn update_status(
    conn: &Connection,
    appointment_id: &Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, SchedulerError> {
    let appointment = appointment_repo::get_appointment(conn, appointment_id)?
        .ok_or(SchedulerError::NotFound)?;
    if appointment.status.is_terminal() {
        return Err(SchedulerError::InvalidTransition);
    }

    let recorded_at = Utc::now();
    if status == AppointmentStatus::Cancelled {
        appointment_repo::record_cancellation(
            conn,
            appointment_id,
            CancelledBy::Admin,
            None,
            recorded_at,
        )?;
    } else {
        appointment_repo::set_status(conn, appointment_id, status, recorded_at)?;
    }
    appointment_repo::insert_history(
        conn,
        appointment_id,
        HistoryEvent::StatusChanged,
        None,
        None,
        Some(status.as_str()),
        recorded_at,
    )?;
    appointment_repo::get_appointment(conn, appointment_id)?.ok_or(SchedulerError::NotFound)
}
