//! API error types with structured JSON responses.
//!
//! Every error renders as `{"error":{"code","message","redirect"?}}`.
//! Authorization failures carry a `redirect` hint: the login page of the
//! portal the caller needs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app_state::StateError;
use crate::auth::gate::{GateRejection, RejectionKind};
use crate::auth::CredentialError;
use crate::db::DatabaseError;
use crate::registration::RegistrationError;
use crate::scheduler::SchedulerError;
use crate::tips::TipsError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated { redirect: &'static str },

    #[error("{message}")]
    Forbidden {
        code: &'static str,
        message: String,
        redirect: Option<&'static str>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    #[error("Tips provider unavailable: {0}")]
    TipsUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, redirect) = match &self {
            ApiError::Validation(detail) => {
                (StatusCode::BAD_REQUEST, "VALIDATION", detail.clone(), None)
            }
            ApiError::Unauthenticated { redirect } => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
                Some(*redirect),
            ),
            ApiError::Forbidden {
                code,
                message,
                redirect,
            } => (StatusCode::FORBIDDEN, *code, message.clone(), *redirect),
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone(), None)
            }
            ApiError::Conflict(detail) => {
                (StatusCode::CONFLICT, "CONFLICT", detail.clone(), None)
            }
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
                None,
            ),
            ApiError::TipsUnavailable(detail) => (
                StatusCode::BAD_GATEWAY,
                "TIPS_UNAVAILABLE",
                detail.clone(),
                None,
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                redirect,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => {
                ApiError::NotFound(format!("{entity_type} not found"))
            }
            DatabaseError::ConstraintViolation(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::LockPoisoned => ApiError::Internal("state lock poisoned".into()),
            StateError::Database(e) => e.into(),
        }
    }
}

impl From<GateRejection> for ApiError {
    fn from(rejection: GateRejection) -> Self {
        let redirect = rejection.redirect();
        match rejection.kind {
            RejectionKind::Unauthenticated => ApiError::Unauthenticated { redirect },
            RejectionKind::WrongPortal => ApiError::Forbidden {
                code: "WRONG_PORTAL",
                message: "This account belongs to a different portal".into(),
                redirect: Some(redirect),
            },
            RejectionKind::ProfileMissing => ApiError::Forbidden {
                code: "PROFILE_MISSING",
                message: "No profile exists for this account".into(),
                redirect: Some(redirect),
            },
            RejectionKind::Unverified => ApiError::Forbidden {
                code: "DOCTOR_UNVERIFIED",
                message: "Your account is awaiting admin verification".into(),
                redirect: Some(redirect),
            },
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidCredentials => ApiError::Forbidden {
                code: "INVALID_CREDENTIALS",
                message: "Invalid username or password".into(),
                redirect: None,
            },
            CredentialError::AccountDisabled => ApiError::Forbidden {
                code: "ACCOUNT_DISABLED",
                message: "This account has been disabled".into(),
                redirect: None,
            },
            CredentialError::WrongPortal { actual } => ApiError::Forbidden {
                code: "WRONG_PORTAL",
                message: "This account belongs to a different portal".into(),
                redirect: Some(actual.login_path()),
            },
            CredentialError::Database(e) => e.into(),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Validation(msg) => ApiError::Validation(msg),
            SchedulerError::PastSlot => {
                ApiError::Validation("the selected date is in the past".into())
            }
            SchedulerError::DoctorUnavailable => {
                ApiError::NotFound("doctor is not available for booking".into())
            }
            SchedulerError::NotFound => ApiError::NotFound("appointment not found".into()),
            SchedulerError::SlotConflict => {
                ApiError::Conflict("the selected slot is already booked".into())
            }
            err @ (SchedulerError::CannotCancel
            | SchedulerError::CannotReschedule
            | SchedulerError::InvalidTransition) => ApiError::Conflict(err.to_string()),
            SchedulerError::Database(e) => e.into(),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Validation(msg) => ApiError::Validation(msg),
            RegistrationError::AdminSignupDisabled => ApiError::Forbidden {
                code: "ADMIN_SIGNUP_DISABLED",
                message: "Admin accounts cannot be self-registered".into(),
                redirect: None,
            },
            RegistrationError::DuplicateIdentity => ApiError::Conflict(
                "an account with that email or username already exists".into(),
            ),
            RegistrationError::Database(e) => e.into(),
        }
    }
}

impl From<TipsError> for ApiError {
    fn from(err: TipsError) -> Self {
        ApiError::TipsUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Portal;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unauthenticated_carries_redirect() {
        let response = ApiError::Unauthenticated {
            redirect: "/patient/login",
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
        assert_eq!(json["error"]["redirect"], "/patient/login");
    }

    #[tokio::test]
    async fn gate_rejection_maps_to_403_with_redirect() {
        let rejection = GateRejection {
            kind: RejectionKind::WrongPortal,
            required: Portal::Admin,
        };
        let response = ApiError::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "WRONG_PORTAL");
        assert_eq!(json["error"]["redirect"], "/admin/login");
    }

    #[tokio::test]
    async fn slot_conflict_is_409() {
        let response = ApiError::from(SchedulerError::SlotConflict).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("secret db path".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
