//! Patient portal endpoints: doctor search, appointments, records,
//! health tips and the daily medication tracker.

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
    appointment as appointment_repo, doctor as doctor_repo, health_tip as tip_repo,
    medication_tracking as tracking_repo, patient as patient_repo,
    prescription as prescription_repo, test_result as test_result_repo,
};
use crate::models::enums::{
    AppointmentMode, AppointmentType, CancelledBy, MedicationSlot, Priority, TipSource,
    TipStatus,
};
use crate::models::{Appointment, HealthTip, Patient, TipReaction};
use crate::scheduler;
use crate::tips::ProfileSummary;

fn patient_of(portal: &PortalContext) -> Result<&Patient, ApiError> {
    portal
        .profile
        .as_patient()
        .ok_or_else(|| ApiError::Internal("portal context mismatch".into()))
}

/// Load an appointment the caller owns; a foreign id reads as not found.
fn owned_appointment(
    conn: &rusqlite::Connection,
    patient: &Patient,
    id: &Uuid,
) -> Result<Appointment, ApiError> {
    let appointment = appointment_repo::get_appointment(conn, id)?
        .filter(|a| a.patient_id == patient.id)
        .ok_or_else(|| ApiError::NotFound("appointment not found".into()))?;
    Ok(appointment)
}

// ═══════════════════════════════════════════════════════════
// Doctor search
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct DoctorSearchQuery {
    pub search: Option<String>,
}

/// Doctor fields a patient may see.
#[derive(Serialize)]
pub struct DoctorCard {
    pub id: Uuid,
    pub name: String,
    pub specialization: Option<String>,
    pub experience_years: u32,
    pub consultation_fee: f64,
}

pub async fn search_doctors(
    State(ctx): State<ApiContext>,
    Extension(_portal): Extension<PortalContext>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Vec<DoctorCard>>, ApiError> {
    let conn = ctx.app.open_db()?;
    let doctors = doctor_repo::search_verified(&conn, query.search.as_deref())?;
    Ok(Json(
        doctors
            .iter()
            .map(|d| DoctorCard {
                id: d.id,
                name: d.full_name(),
                specialization: d.specialization.clone(),
                experience_years: d.experience_years,
                consultation_fee: d.consultation_fee.in_person,
            })
            .collect(),
    ))
}

// ═══════════════════════════════════════════════════════════
// Appointments
// ═══════════════════════════════════════════════════════════

fn default_type() -> AppointmentType {
    AppointmentType::Consultation
}
fn default_mode() -> AppointmentMode {
    AppointmentMode::InPerson
}
fn default_priority() -> Priority {
    Priority::Medium
}

#[derive(Deserialize)]
pub struct BookBody {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    #[serde(rename = "type", default = "default_type")]
    pub appointment_type: AppointmentType,
    #[serde(default = "default_mode")]
    pub mode: AppointmentMode,
    pub reason: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub patient_notes: Option<String>,
    pub duration_minutes: Option<u32>,
}

pub async fn book_appointment(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<BookBody>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;

    let request = scheduler::BookingRequest {
        doctor_id: body.doctor_id,
        date: body.date,
        time: body.time,
        appointment_type: body.appointment_type,
        mode: body.mode,
        reason: body.reason,
        symptoms: body.symptoms,
        priority: body.priority,
        patient_notes: body.patient_notes,
        duration_minutes: body.duration_minutes,
    };
    let appointment = scheduler::book(&conn, &patient.id, &request, Utc::now().naive_utc())?;
    Ok((StatusCode::CREATED, Json(appointment)).into_response())
}

pub async fn list_appointments(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(appointment_repo::list_for_patient(&conn, &patient.id)?))
}

pub async fn get_appointment(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(owned_appointment(&conn, patient, &id)?))
}

pub async fn appointment_history(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    owned_appointment(&conn, patient, &id)?;
    let trail = appointment_repo::history_for(&conn, &id)?;
    Ok(Json(trail).into_response())
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
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    owned_appointment(&conn, patient, &id)?;
    let cancelled = scheduler::cancel(
        &conn,
        &id,
        CancelledBy::Patient,
        body.reason.as_deref(),
        Utc::now().naive_utc(),
    )?;
    Ok(Json(cancelled))
}

#[derive(Deserialize)]
pub struct RescheduleBody {
    pub date: NaiveDate,
    pub time: String,
    pub reason: Option<String>,
}

pub async fn reschedule_appointment(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<Appointment>, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    owned_appointment(&conn, patient, &id)?;
    let moved = scheduler::reschedule(
        &conn,
        &id,
        body.date,
        &body.time,
        body.reason.as_deref(),
        Utc::now().naive_utc(),
    )?;
    Ok(Json(moved))
}

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

pub async fn list_prescriptions(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(prescription_repo::list_for_patient(&conn, &patient.id)?).into_response())
}

pub async fn get_prescription(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let prescription = prescription_repo::get_prescription(&conn, &id)?
        .filter(|p| p.patient_id == patient.id)
        .ok_or_else(|| ApiError::NotFound("prescription not found".into()))?;
    Ok(Json(prescription).into_response())
}

pub async fn list_test_results(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(test_result_repo::list_for_patient(&conn, &patient.id)?).into_response())
}

pub async fn get_test_result(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let result = test_result_repo::get_test_result(&conn, &id)?
        .filter(|r| r.patient_id == patient.id)
        .ok_or_else(|| ApiError::NotFound("test result not found".into()))?;
    Ok(Json(result).into_response())
}

// ═══════════════════════════════════════════════════════════
// Health tips
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct TipView {
    #[serde(flatten)]
    pub tip: HealthTip,
    pub reaction: TipReaction,
}

pub async fn list_health_tips(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<TipView>>, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let tips = tip_repo::list_visible_to_patient(&conn, &patient.id)?;
    let mut views = Vec::with_capacity(tips.len());
    for tip in tips {
        let reaction = tip_repo::get_reaction(&conn, &tip.id, &patient.id)?;
        views.push(TipView { tip, reaction });
    }
    Ok(Json(views))
}

/// Generate personalized tips via the provider and persist them for this
/// patient. Provider failures surface as 502; nothing is stored then.
pub async fn generate_health_tips(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?.clone();
    let summary = ProfileSummary::from_patient(&patient, Utc::now().date_naive());
    let generated = ctx.app.tips.generate_tips(&summary).await?;

    let conn = ctx.app.open_db()?;
    let mut stored = Vec::with_capacity(generated.len());
    for tip in generated {
        let record = HealthTip {
            id: Uuid::new_v4(),
            title: tip.title,
            summary: tip.summary,
            content: tip.content,
            category: tip.category,
            tags: vec![],
            priority: Priority::Medium,
            status: TipStatus::Published,
            featured: false,
            source: TipSource::Generated,
            patient_id: Some(patient.id),
            created_at: Utc::now(),
        };
        tip_repo::insert_tip(&conn, &record)?;
        stored.push(record);
    }
    Ok((StatusCode::CREATED, Json(stored)).into_response())
}

pub async fn like_tip(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TipReaction>, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    tip_repo::get_tip(&conn, &id)?.ok_or_else(|| ApiError::NotFound("tip not found".into()))?;
    Ok(Json(tip_repo::toggle_like(&conn, &id, &patient.id)?))
}

pub async fn bookmark_tip(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TipReaction>, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    tip_repo::get_tip(&conn, &id)?.ok_or_else(|| ApiError::NotFound("tip not found".into()))?;
    Ok(Json(tip_repo::toggle_bookmark(&conn, &id, &patient.id)?))
}

// ═══════════════════════════════════════════════════════════
// Medication tracking
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct TrackingQuery {
    pub date: Option<NaiveDate>,
}

pub async fn list_medication_entries(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Query(query): Query<TrackingQuery>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(tracking_repo::list_for_date(&conn, &patient.id, date)?).into_response())
}

#[derive(Deserialize)]
pub struct ToggleBody {
    pub date: Option<NaiveDate>,
    pub medication_name: String,
    pub slot: MedicationSlot,
}

pub async fn toggle_medication_entry(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<ToggleBody>,
) -> Result<Response, ApiError> {
    let patient = patient_of(&portal)?;
    let name = body.medication_name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("medication_name is required".into()));
    }
    let conn = ctx.app.open_db()?;
    let date = body.date.unwrap_or_else(|| Utc::now().date_naive());
    let entry =
        tracking_repo::toggle_entry(&conn, &patient.id, date, name, body.slot, Utc::now())?;
    Ok(Json(entry).into_response())
}

#[derive(Deserialize)]
pub struct AdherenceQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub async fn medication_adherence(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Query(query): Query<AdherenceQuery>,
) -> Result<Response, ApiError> {
    if query.from > query.to {
        return Err(ApiError::Validation("from must not be after to".into()));
    }
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(tracking_repo::adherence(&conn, &patient.id, query.from, query.to)?).into_response())
}

// ═══════════════════════════════════════════════════════════
// Profile
// ═══════════════════════════════════════════════════════════

pub async fn get_profile(
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Patient>, ApiError> {
    Ok(Json(patient_of(&portal)?.clone()))
}

#[derive(Deserialize)]
pub struct ProfileUpdateBody {
    pub phone: String,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
}

pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<ProfileUpdateBody>,
) -> Result<Json<Patient>, ApiError> {
    if body.phone.len() != 10 || !body.phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation("phone must be exactly 10 digits".into()));
    }
    let patient = patient_of(&portal)?;
    let conn = ctx.app.open_db()?;
    patient_repo::update_patient(
        &conn,
        &patient.id,
        &patient_repo::PatientUpdate {
            phone: body.phone,
            blood_group: body.blood_group,
            address: body.address,
            city: body.city,
            emergency_contact: body.emergency_contact,
            allergies: body.allergies,
            chronic_conditions: body.chronic_conditions,
        },
    )?;
    let updated = patient_repo::get_patient(&conn, &patient.id)?
        .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
    Ok(Json(updated))
}
