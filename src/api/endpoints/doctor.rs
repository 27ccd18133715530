//! Doctor portal endpoints: the day's appointments, clinical records
//! (prescriptions, test results), schedule management and the profile.
//!
//! A doctor only ever sees patients they share at least one appointment
//! with; anything else reads as not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PortalContext};
use crate::db::repository::{
    appointment as appointment_repo, doctor as doctor_repo, patient as patient_repo,
    prescription as prescription_repo, test_result as test_result_repo,
};
use crate::models::doctor::{ConsultationFee, ShiftSlot, UnavailableDate};
use crate::models::enums::{CancelledBy, PrescriptionStatus, TestStatus};
use crate::models::prescription::PrescribedMedication;
use crate::models::test_result::TestValue;
use crate::models::{Appointment, Doctor, Patient, Prescription, TestResult};
use crate::scheduler;

fn doctor_of(portal: &PortalContext) -> Result<&Doctor, ApiError> {
    portal
        .profile
        .as_doctor()
        .ok_or_else(|| ApiError::Internal("portal context mismatch".into()))
}

fn owned_appointment(
    conn: &rusqlite::Connection,
    doctor: &Doctor,
    id: &Uuid,
) -> Result<Appointment, ApiError> {
    let appointment = appointment_repo::get_appointment(conn, id)?
        .filter(|a| a.doctor_id == doctor.id)
        .ok_or_else(|| ApiError::NotFound("appointment not found".into()))?;
    Ok(appointment)
}

/// True when the doctor has ever had an appointment with this patient.
fn treats_patient(
    conn: &rusqlite::Connection,
    doctor: &Doctor,
    patient_id: &Uuid,
) -> Result<bool, ApiError> {
    let ids = appointment_repo::patient_ids_for_doctor(conn, &doctor.id)?;
    Ok(ids.contains(patient_id))
}

// ═══════════════════════════════════════════════════════════
// Appointments
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct AppointmentQuery {
    pub date: Option<NaiveDate>,
}

pub async fn list_appointments(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(appointment_repo::list_for_doctor(
        &conn,
        &doctor.id,
        query.date,
    )?))
}

pub async fn get_appointment(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(owned_appointment(&conn, doctor, &id)?))
}

#[derive(Deserialize)]
pub struct NotesBody {
    pub notes: String,
}

pub async fn set_appointment_notes(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<NotesBody>,
) -> Result<Json<Appointment>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    owned_appointment(&conn, doctor, &id)?;
    appointment_repo::set_doctor_notes(&conn, &id, &body.notes, Utc::now())?;
    let updated = appointment_repo::get_appointment(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("appointment not found".into()))?;
    Ok(Json(updated))
}

#[derive(Deserialize, Default)]
pub struct CompleteBody {
    pub notes: Option<String>,
}

pub async fn complete_appointment(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<Appointment>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    owned_appointment(&conn, doctor, &id)?;
    Ok(Json(scheduler::complete(&conn, &id, body.notes.as_deref())?))
}

#[derive(Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

pub async fn cancel_appointment(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Appointment>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    owned_appointment(&conn, doctor, &id)?;
    let cancelled = scheduler::cancel(
        &conn,
        &id,
        CancelledBy::Doctor,
        body.reason.as_deref(),
        Utc::now().naive_utc(),
    )?;
    Ok(Json(cancelled))
}

// ═══════════════════════════════════════════════════════════
// Patients
// ═══════════════════════════════════════════════════════════

pub async fn list_patients(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let ids = appointment_repo::patient_ids_for_doctor(&conn, &doctor.id)?;
    let mut patients = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(patient) = patient_repo::get_patient(&conn, &id)? {
            patients.push(patient);
        }
    }
    Ok(Json(patients))
}

pub async fn get_patient(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    if !treats_patient(&conn, doctor, &id)? {
        return Err(ApiError::NotFound("patient not found".into()));
    }
    let patient = patient_repo::get_patient(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
    Ok(Json(patient))
}

// ═══════════════════════════════════════════════════════════
// Prescriptions
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct PrescriptionBody {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub medications: Vec<PrescribedMedication>,
    pub notes: Option<String>,
    pub valid_until: Option<NaiveDate>,
}

pub async fn create_prescription(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<PrescriptionBody>,
) -> Result<Response, ApiError> {
    if body.diagnosis.trim().is_empty() {
        return Err(ApiError::Validation("diagnosis is required".into()));
    }
    if body.medications.is_empty() {
        return Err(ApiError::Validation(
            "at least one medication is required".into(),
        ));
    }
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    if !treats_patient(&conn, doctor, &body.patient_id)? {
        return Err(ApiError::NotFound("patient not found".into()));
    }
    if let Some(appointment_id) = &body.appointment_id {
        let appointment = owned_appointment(&conn, doctor, appointment_id)?;
        if appointment.patient_id != body.patient_id {
            return Err(ApiError::Validation(
                "appointment belongs to a different patient".into(),
            ));
        }
    }

    let prescription = Prescription {
        id: Uuid::new_v4(),
        patient_id: body.patient_id,
        doctor_id: doctor.id,
        appointment_id: body.appointment_id,
        diagnosis: body.diagnosis,
        medications: body.medications,
        notes: body.notes,
        status: PrescriptionStatus::Active,
        valid_until: body.valid_until,
        created_at: Utc::now(),
    };
    prescription_repo::insert_prescription(&conn, &prescription)?;
    Ok((StatusCode::CREATED, Json(prescription)).into_response())
}

pub async fn list_prescriptions(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<Prescription>>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(prescription_repo::list_for_doctor(&conn, &doctor.id)?))
}

pub async fn get_prescription(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Prescription>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let prescription = prescription_repo::get_prescription(&conn, &id)?
        .filter(|p| p.doctor_id == doctor.id)
        .ok_or_else(|| ApiError::NotFound("prescription not found".into()))?;
    Ok(Json(prescription))
}

#[derive(Deserialize)]
pub struct PrescriptionStatusBody {
    pub status: PrescriptionStatus,
}

pub async fn set_prescription_status(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<PrescriptionStatusBody>,
) -> Result<Json<Prescription>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    prescription_repo::get_prescription(&conn, &id)?
        .filter(|p| p.doctor_id == doctor.id)
        .ok_or_else(|| ApiError::NotFound("prescription not found".into()))?;
    prescription_repo::set_status(&conn, &id, body.status)?;
    let updated = prescription_repo::get_prescription(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("prescription not found".into()))?;
    Ok(Json(updated))
}

// ═══════════════════════════════════════════════════════════
// Test results
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct TestResultBody {
    pub patient_id: Uuid,
    pub test_name: String,
    pub test_type: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub values: Vec<TestValue>,
    pub status: Option<TestStatus>,
    pub test_date: NaiveDate,
}

pub async fn create_test_result(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<TestResultBody>,
) -> Result<Response, ApiError> {
    if body.test_name.trim().is_empty() {
        return Err(ApiError::Validation("test_name is required".into()));
    }
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    if !treats_patient(&conn, doctor, &body.patient_id)? {
        return Err(ApiError::NotFound("patient not found".into()));
    }

    let result = TestResult {
        id: Uuid::new_v4(),
        patient_id: body.patient_id,
        doctor_id: doctor.id,
        test_name: body.test_name,
        test_type: body.test_type,
        summary: body.summary,
        values: body.values,
        status: body.status.unwrap_or(TestStatus::Pending),
        test_date: body.test_date,
        created_at: Utc::now(),
    };
    test_result_repo::insert_test_result(&conn, &result)?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

pub async fn list_test_results(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<TestResult>>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(test_result_repo::list_for_doctor(&conn, &doctor.id)?))
}

#[derive(Deserialize)]
pub struct TestStatusBody {
    pub status: TestStatus,
}

pub async fn set_test_result_status(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<TestStatusBody>,
) -> Result<Json<TestResult>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    test_result_repo::get_test_result(&conn, &id)?
        .filter(|r| r.doctor_id == doctor.id)
        .ok_or_else(|| ApiError::NotFound("test result not found".into()))?;
    test_result_repo::set_status(&conn, &id, body.status)?;
    let updated = test_result_repo::get_test_result(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("test result not found".into()))?;
    Ok(Json(updated))
}

// ═══════════════════════════════════════════════════════════
// Schedule and profile
// ═══════════════════════════════════════════════════════════

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

#[derive(Serialize)]
pub struct ScheduleView {
    pub schedule: Vec<ShiftSlot>,
    pub unavailable_dates: Vec<UnavailableDate>,
}

/// Current weekly schedule, read fresh so edits made elsewhere show up.
pub async fn get_schedule(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<ScheduleView>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let current = doctor_repo::get_doctor(&conn, &doctor.id)?
        .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
    Ok(Json(ScheduleView {
        schedule: current.schedule,
        unavailable_dates: current.unavailable_dates,
    }))
}

#[derive(Deserialize)]
pub struct ScheduleBody {
    pub schedule: Vec<ShiftSlot>,
}

pub async fn update_schedule(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<ScheduleBody>,
) -> Result<Json<Vec<ShiftSlot>>, ApiError> {
    for slot in &body.schedule {
        if !WEEKDAYS.contains(&slot.day.as_str()) {
            return Err(ApiError::Validation(format!(
                "unknown weekday: {}",
                slot.day
            )));
        }
        if slot.start_time >= slot.end_time {
            return Err(ApiError::Validation(
                "shift start must be before its end".into(),
            ));
        }
        if slot.slot_minutes == 0 {
            return Err(ApiError::Validation("slot_minutes must be positive".into()));
        }
    }
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    doctor_repo::update_schedule(&conn, &doctor.id, &body.schedule)?;
    Ok(Json(body.schedule))
}

#[derive(Deserialize)]
pub struct UnavailableDatesBody {
    pub dates: Vec<UnavailableDate>,
}

pub async fn update_unavailable_dates(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<UnavailableDatesBody>,
) -> Result<Json<Vec<UnavailableDate>>, ApiError> {
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    doctor_repo::update_unavailable_dates(&conn, &doctor.id, &body.dates)?;
    Ok(Json(body.dates))
}

pub async fn get_profile(
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Doctor>, ApiError> {
    Ok(Json(doctor_of(&portal)?.clone()))
}

#[derive(Deserialize)]
pub struct ProfileUpdateBody {
    pub phone: String,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: u32,
    pub consultation_fee: ConsultationFee,
}

pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<ProfileUpdateBody>,
) -> Result<Json<Doctor>, ApiError> {
    if body.phone.len() != 10 || !body.phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation("phone must be exactly 10 digits".into()));
    }
    if body.consultation_fee.in_person < 0.0 {
        return Err(ApiError::Validation("fee must not be negative".into()));
    }
    let doctor = doctor_of(&portal)?;
    let conn = ctx.app.open_db()?;
    doctor_repo::update_doctor(
        &conn,
        &doctor.id,
        &doctor_repo::DoctorUpdate {
            phone: body.phone,
            specialization: body.specialization,
            license_number: body.license_number,
            experience_years: body.experience_years,
            consultation_fee: body.consultation_fee,
        },
    )?;
    let updated = doctor_repo::get_doctor(&conn, &doctor.id)?
        .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
    Ok(Json(updated))
}
