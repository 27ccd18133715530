//! `GET /dashboard` — a portal-appropriate summary for whoever is logged
//! in. Shared route; the payload shape depends on the caller's portal.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::auth::gate;
use crate::db::repository::{appointment, prescription, reports};
use crate::models::enums::Portal;

#[derive(Serialize)]
pub struct DashboardResponse {
    pub portal: Portal,
    pub display_name: String,
    pub stats: serde_json::Value,
}

pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let conn = ctx.app.open_db()?;
    let portal = session.user.portal;

    // The gate still applies: an unverified doctor has no dashboard.
    let profile = match gate::authorize(&conn, Some(&session.user), portal)? {
        Ok(profile) => profile,
        Err(rejection) => {
            if rejection.revokes_session() {
                ctx.app.revoke_user_sessions(&session.user.id)?;
            }
            return Err(rejection.into());
        }
    };

    let today = Utc::now().date_naive();
    let stats = match &profile {
        crate::models::Profile::Patient(patient) => {
            let appointments = appointment::list_for_patient(&conn, &patient.id)?;
            let upcoming = appointments
                .iter()
                .filter(|a| !a.status.is_terminal() && a.date >= today)
                .count();
            let prescriptions = prescription::list_for_patient(&conn, &patient.id)?.len();
            serde_json::json!({
                "upcoming_appointments": upcoming,
                "total_appointments": appointments.len(),
                "prescriptions": prescriptions,
            })
        }
        crate::models::Profile::Doctor(doctor) => {
            let today_appointments = appointment::list_for_doctor(&conn, &doctor.id, Some(today))?;
            let all = appointment::list_for_doctor(&conn, &doctor.id, None)?;
            let patients = appointment::patient_ids_for_doctor(&conn, &doctor.id)?;
            serde_json::json!({
                "appointments_today": today_appointments.len(),
                "total_appointments": all.len(),
                "patients": patients.len(),
            })
        }
        crate::models::Profile::Admin(_) => {
            let counts = reports::platform_counts(&conn)?;
            serde_json::to_value(counts)
                .map_err(|e| ApiError::Internal(e.to_string()))?
        }
    };

    Ok(Json(DashboardResponse {
        portal,
        display_name: profile.display_name(),
        stats,
    }))
}
