//! Session and portal-gate middleware.
//!
//! `require_session` resolves the cookie to an identity and injects
//! `SessionContext`. The portal variants additionally run the access gate
//! and inject `PortalContext`; a gate rejection becomes the structured 401/
//! 403 with the portal's login redirect. An unverified doctor hitting any
//! gate loses their live sessions on the spot.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::middleware::rate::find_session_token;
use crate::api::types::{ApiContext, PortalContext, SessionContext};
use crate::auth::gate;
use crate::db::repository::user as user_repo;
use crate::models::enums::Portal;
use crate::models::User;

pub async fn require_patient(req: Request<axum::body::Body>, next: Next) -> Response {
    match gate_inner(Portal::Patient, req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

pub async fn require_doctor(req: Request<axum::body::Body>, next: Next) -> Response {
    match gate_inner(Portal::Doctor, req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

pub async fn require_admin(req: Request<axum::body::Body>, next: Next) -> Response {
    match gate_inner(Portal::Admin, req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

/// Any valid session, no portal requirement. Used by `/dashboard` and
/// `/logout`, which serve all three portals.
pub async fn require_session(req: Request<axum::body::Body>, next: Next) -> Response {
    match session_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

fn context_of(req: &Request<axum::body::Body>) -> Result<ApiContext, ApiError> {
    req.extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))
}

/// Resolve the session cookie to its user, if any.
fn resolve_user(
    ctx: &ApiContext,
    req: &Request<axum::body::Body>,
) -> Result<Option<(User, String)>, ApiError> {
    let Some(token) = req
        .headers()
        .get("Cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(find_session_token)
    else {
        return Ok(None);
    };
    let Some(user_id) = ctx.app.resolve_session(&token)? else {
        return Ok(None);
    };
    let conn = ctx.app.open_db()?;
    let user = user_repo::get_user(&conn, &user_id)?;
    Ok(user.map(|u| (u, token)))
}

async fn session_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = context_of(&req)?;
    let (user, token) = resolve_user(&ctx, &req)?.ok_or(ApiError::Unauthenticated {
        // No portal is implied by these routes; send to the patient login.
        redirect: Portal::Patient.login_path(),
    })?;
    req.extensions_mut().insert(SessionContext { user, token });
    Ok(next.run(req).await)
}

async fn gate_inner(
    portal: Portal,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = context_of(&req)?;
    let resolved = resolve_user(&ctx, &req)?;
    let conn = ctx.app.open_db()?;

    let user = resolved.as_ref().map(|(user, _)| user);
    match gate::authorize(&conn, user, portal)? {
        Ok(profile) => {
            let (user, token) = resolved.ok_or(ApiError::Internal(
                "gate admitted an anonymous request".into(),
            ))?;
            req.extensions_mut().insert(SessionContext {
                user: user.clone(),
                token,
            });
            req.extensions_mut().insert(PortalContext { user, profile });
            Ok(next.run(req).await)
        }
        Err(rejection) => {
            if rejection.revokes_session() {
                if let Some((user, _)) = &resolved {
                    ctx.app.revoke_user_sessions(&user.id)?;
                    tracing::warn!(user = %user.id, "revoked sessions of unverified doctor");
                }
            }
            Err(rejection.into())
        }
    }
}
