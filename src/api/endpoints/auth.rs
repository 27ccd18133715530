//! Login, signup and logout for the three portals.
//!
//! Login runs credentials then the portal gate, so an unverified doctor is
//! refused at the door (and any sessions they still hold are revoked).

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{clear_session_cookie, session_cookie, ApiContext, SessionContext};
use crate::auth::{credentials, gate};
use crate::models::enums::{Gender, Portal};
use crate::models::{Profile, User};
use crate::registration;

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub login: String,
    pub password: String,
}

/// Identity fields safe to hand to the client.
#[derive(Serialize)]
pub struct PublicUser {
    pub id: uuid::Uuid,
    pub email: String,
    pub username: String,
    pub portal: Portal,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            portal: user.portal,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub profile: Profile,
}

pub async fn patient_login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    login(ctx, Portal::Patient, request).await
}

pub async fn doctor_login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    login(ctx, Portal::Doctor, request).await
}

pub async fn admin_login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    login(ctx, Portal::Admin, request).await
}

async fn login(
    ctx: ApiContext,
    portal: Portal,
    request: LoginRequest,
) -> Result<Response, ApiError> {
    let conn = ctx.app.open_db()?;
    let user = credentials::authenticate(&conn, portal, &request.login, &request.password)?;

    let profile = match gate::authorize(&conn, Some(&user), portal)? {
        Ok(profile) => profile,
        Err(rejection) => {
            // An unverified doctor may hold sessions from before an admin
            // withdrew verification; tear them down now.
            if rejection.revokes_session() {
                ctx.app.revoke_user_sessions(&user.id)?;
            }
            return Err(rejection.into());
        }
    };

    let token = ctx.app.create_session(user.id)?;
    tracing::info!(user = %user.id, portal = %portal, "login");

    let body = Json(LoginResponse {
        user: PublicUser::from(&user),
        profile,
    });
    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        body,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: Option<u32>,
    pub consultation_fee: Option<f64>,
}

impl SignupBody {
    fn into_request(self) -> registration::SignupRequest {
        registration::SignupRequest {
            email: self.email,
            username: self.username,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            specialization: self.specialization,
            license_number: self.license_number,
            experience_years: self.experience_years,
            consultation_fee: self.consultation_fee,
        }
    }
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub user: PublicUser,
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// Patient signup; the new account is logged in immediately.
pub async fn patient_signup(
    State(ctx): State<ApiContext>,
    Json(body): Json<SignupBody>,
) -> Result<Response, ApiError> {
    let mut conn = ctx.app.open_db()?;
    let (user, profile) =
        registration::signup(&mut conn, Portal::Patient, &body.into_request())?;

    let token = ctx.app.create_session(user.id)?;
    let response = Json(SignupResponse {
        user: PublicUser::from(&user),
        profile,
        notice: None,
    });
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&token))],
        response,
    )
        .into_response())
}

/// Doctor signup; no session is issued because the profile starts
/// unverified and cannot pass the gate yet.
pub async fn doctor_signup(
    State(ctx): State<ApiContext>,
    Json(body): Json<SignupBody>,
) -> Result<Response, ApiError> {
    let mut conn = ctx.app.open_db()?;
    let (user, profile) = registration::signup(&mut conn, Portal::Doctor, &body.into_request())?;

    let response = Json(SignupResponse {
        user: PublicUser::from(&user),
        profile,
        notice: Some("Your account will be reviewed by an administrator before you can log in."),
    });
    Ok((StatusCode::CREATED, response).into_response())
}

/// There is no admin self-signup; this route exists only to answer the
/// attempt with a clear 403 instead of a 404.
pub async fn admin_signup(
    State(_ctx): State<ApiContext>,
    Json(_body): Json<SignupBody>,
) -> Result<Response, ApiError> {
    Err(registration::RegistrationError::AdminSignupDisabled.into())
}

pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Response, ApiError> {
    ctx.app.revoke_session(&session.token)?;
    tracing::info!(user = %session.user.id, "logout");
    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response())
}
