//! Admin portal endpoints: doctor verification, user management,
//! appointment oversight, health-tip publishing, reports and settings.
//!
//! Each operation checks the acting admin's permission flags; a missing
//! flag answers 403 with a `PERMISSION_DENIED` code.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PortalContext, SessionContext};
use crate::auth::credentials;
use crate::db::repository::{
    appointment as appointment_repo, doctor as doctor_repo, health_tip as tip_repo,
    patient as patient_repo, reports, settings as settings_repo, user as user_repo,
};
use crate::models::enums::{AppointmentStatus, Priority, TipSource, TipStatus};
use crate::models::{Admin, Appointment, Doctor, HealthTip, Patient};
use crate::scheduler;

fn admin_of(portal: &PortalContext) -> Result<&Admin, ApiError> {
    portal
        .profile
        .as_admin()
        .ok_or_else(|| ApiError::Internal("portal context mismatch".into()))
}

fn require_permission(granted: bool, what: &str) -> Result<(), ApiError> {
    if granted {
        Ok(())
    } else {
        Err(ApiError::Forbidden {
            code: "PERMISSION_DENIED",
            message: format!("Your admin account may not {what}"),
            redirect: None,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Doctor verification
// ═══════════════════════════════════════════════════════════

pub async fn list_pending_doctors(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_doctors, "manage doctors")?;
    let conn = ctx.app.open_db()?;
    Ok(Json(doctor_repo::list_unverified(&conn)?))
}

#[derive(Deserialize)]
pub struct VerifyBody {
    pub verified: bool,
}

/// Verify or unverify a doctor. Withdrawing verification also revokes any
/// live sessions, so the doctor is locked out immediately, not at next
/// login.
pub async fn verify_doctor(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<Doctor>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_doctors, "manage doctors")?;
    let conn = ctx.app.open_db()?;
    let doctor = doctor_repo::get_doctor(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;

    doctor_repo::set_verified(&conn, &id, body.verified, Utc::now())?;
    if !body.verified {
        ctx.app.revoke_user_sessions(&doctor.user_id)?;
        tracing::warn!(doctor = %doctor.id, "verification withdrawn, sessions revoked");
    } else {
        tracing::info!(doctor = %doctor.id, "doctor verified");
    }

    let updated = doctor_repo::get_doctor(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
    Ok(Json(updated))
}

// ═══════════════════════════════════════════════════════════
// User management
// ═══════════════════════════════════════════════════════════

pub async fn list_patients(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_patients, "manage patients")?;
    let conn = ctx.app.open_db()?;
    Ok(Json(patient_repo::list_patients(&conn)?))
}

pub async fn get_patient(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_patients, "manage patients")?;
    let conn = ctx.app.open_db()?;
    let patient = patient_repo::get_patient(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
    Ok(Json(patient))
}

/// Delete a patient account. Removes the identity row; the profile and its
/// dependent records go with it via cascade.
pub async fn delete_patient(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_patients, "manage patients")?;
    let conn = ctx.app.open_db()?;
    let patient = patient_repo::get_patient(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
    ctx.app.revoke_user_sessions(&patient.user_id)?;
    user_repo::delete_user(&conn, &patient.user_id)?;
    tracing::warn!(patient = %id, "patient account deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_doctors(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_doctors, "manage doctors")?;
    let conn = ctx.app.open_db()?;
    Ok(Json(doctor_repo::list_doctors(&conn)?))
}

pub async fn get_doctor(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Doctor>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_doctors, "manage doctors")?;
    let conn = ctx.app.open_db()?;
    let doctor = doctor_repo::get_doctor(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
    Ok(Json(doctor))
}

pub async fn delete_doctor(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_doctors, "manage doctors")?;
    let conn = ctx.app.open_db()?;
    let doctor = doctor_repo::get_doctor(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
    ctx.app.revoke_user_sessions(&doctor.user_id)?;
    user_repo::delete_user(&conn, &doctor.user_id)?;
    tracing::warn!(doctor = %id, "doctor account deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ═══════════════════════════════════════════════════════════
// Appointment oversight
// ═══════════════════════════════════════════════════════════

pub async fn list_appointments(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_appointments, "manage appointments")?;
    let conn = ctx.app.open_db()?;
    Ok(Json(appointment_repo::list_all(&conn)?))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: AppointmentStatus,
}

pub async fn update_appointment_status(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Appointment>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_appointments, "manage appointments")?;
    let conn = ctx.app.open_db()?;
    Ok(Json(scheduler::update_status(&conn, &id, body.status)?))
}

pub async fn delete_appointment(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.manage_appointments, "manage appointments")?;
    let conn = ctx.app.open_db()?;
    appointment_repo::get_appointment(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("appointment not found".into()))?;
    appointment_repo::delete_appointment(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ═══════════════════════════════════════════════════════════
// Health tips
// ═══════════════════════════════════════════════════════════

fn default_tip_status() -> TipStatus {
    TipStatus::Draft
}
fn default_tip_priority() -> Priority {
    Priority::Medium
}

#[derive(Deserialize)]
pub struct TipBody {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_tip_priority")]
    pub priority: Priority,
    #[serde(default = "default_tip_status")]
    pub status: TipStatus,
    #[serde(default)]
    pub featured: bool,
}

pub async fn create_tip(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<TipBody>,
) -> Result<Response, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    admin_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let tip = HealthTip {
        id: Uuid::new_v4(),
        title: body.title,
        summary: body.summary,
        content: body.content,
        category: body.category,
        tags: body.tags,
        priority: body.priority,
        status: body.status,
        featured: body.featured,
        source: TipSource::Admin,
        patient_id: None,
        created_at: Utc::now(),
    };
    tip_repo::insert_tip(&conn, &tip)?;
    Ok((StatusCode::CREATED, Json(tip)).into_response())
}

/// Every tip regardless of status or audience, with its like count.
#[derive(Serialize)]
pub struct AdminTipView {
    #[serde(flatten)]
    pub tip: HealthTip,
    pub likes: i64,
}

pub async fn list_tips(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<Vec<AdminTipView>>, ApiError> {
    admin_of(&portal)?;
    let conn = ctx.app.open_db()?;
    let tips = tip_repo::list_all(&conn)?;
    let mut views = Vec::with_capacity(tips.len());
    for tip in tips {
        let likes = tip_repo::like_count(&conn, &tip.id)?;
        views.push(AdminTipView { tip, likes });
    }
    Ok(Json(views))
}

pub async fn update_tip(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<TipBody>,
) -> Result<Json<HealthTip>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    admin_of(&portal)?;
    let conn = ctx.app.open_db()?;
    tip_repo::update_tip(
        &conn,
        &id,
        &tip_repo::TipUpdate {
            title: body.title,
            summary: body.summary,
            content: body.content,
            category: body.category,
            tags: body.tags,
            priority: body.priority,
            featured: body.featured,
        },
    )?;
    tip_repo::set_status(&conn, &id, body.status)?;
    let updated = tip_repo::get_tip(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("tip not found".into()))?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct TipStatusBody {
    pub status: TipStatus,
}

pub async fn set_tip_status(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<TipStatusBody>,
) -> Result<Json<HealthTip>, ApiError> {
    admin_of(&portal)?;
    let conn = ctx.app.open_db()?;
    tip_repo::set_status(&conn, &id, body.status)?;
    let updated = tip_repo::get_tip(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("tip not found".into()))?;
    Ok(Json(updated))
}

pub async fn delete_tip(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    admin_of(&portal)?;
    let conn = ctx.app.open_db()?;
    tip_repo::delete_tip(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ═══════════════════════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct ReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub counts: reports::PlatformCounts,
    pub appointments_by_status: Vec<reports::StatusCount>,
    pub daily_volume: Vec<reports::DailyVolume>,
    pub completed_revenue: f64,
    pub busiest_doctors: Vec<reports::DoctorLoad>,
    pub by_specialization: Vec<reports::SpecializationLoad>,
}

/// Platform report over a date range; defaults to the last 30 days.
pub async fn report(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, ApiError> {
    let admin = admin_of(&portal)?;
    require_permission(admin.permissions.view_reports, "view reports")?;

    let to = query.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = query.from.unwrap_or(to - Duration::days(30));
    if from > to {
        return Err(ApiError::Validation("from must not be after to".into()));
    }

    let conn = ctx.app.open_db()?;
    Ok(Json(ReportResponse {
        from,
        to,
        counts: reports::platform_counts(&conn)?,
        appointments_by_status: reports::appointments_by_status(&conn)?,
        daily_volume: reports::appointment_volume(&conn, from, to)?,
        completed_revenue: reports::completed_revenue(&conn, from, to)?,
        busiest_doctors: reports::busiest_doctors(&conn, 5)?,
        by_specialization: reports::load_by_specialization(&conn)?,
    }))
}

// ═══════════════════════════════════════════════════════════
// Settings and account
// ═══════════════════════════════════════════════════════════

pub async fn get_settings(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    admin_of(&portal)?;
    let conn = ctx.app.open_db()?;
    Ok(Json(settings_repo::all_settings(&conn)?))
}

pub async fn put_settings(
    State(ctx): State<ApiContext>,
    Extension(portal): Extension<PortalContext>,
    Json(body): Json<BTreeMap<String, String>>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    admin_of(&portal)?;
    let conn = ctx.app.open_db()?;
    for (key, value) in &body {
        if key.trim().is_empty() {
            return Err(ApiError::Validation("setting keys must be non-empty".into()));
        }
        settings_repo::set_setting(&conn, key, value)?;
    }
    Ok(Json(settings_repo::all_settings(&conn)?))
}

#[derive(Deserialize)]
pub struct PasswordBody {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<PasswordBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.new_password.len() < crate::registration::MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters",
            crate::registration::MIN_PASSWORD_LENGTH
        )));
    }
    if !credentials::verify_password(&body.current_password, &session.user.password_hash) {
        return Err(ApiError::Forbidden {
            code: "INVALID_CREDENTIALS",
            message: "Current password is incorrect".into(),
            redirect: None,
        });
    }
    let conn = ctx.app.open_db()?;
    let hash = credentials::hash_password(&body.new_password);
    user_repo::update_password_hash(&conn, &session.user.id, &hash)?;
    tracing::info!(user = %session.user.id, "password changed");
    Ok(Json(serde_json::json!({ "ok": true })))
}
