//! Per-caller rate limiting middleware (sliding window, 100/min, 1000/hr).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SESSION_COOKIE};

/// Extract a rate-limit key: the session token prefix when present, else
/// the advertised client address, else anonymous. Advisory — the key is
/// client-influenced, so this throttles accidents, not adversaries.
fn rate_key(req: &Request<axum::body::Body>) -> String {
    let from_cookie = req
        .headers()
        .get("Cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(find_session_token);
    if let Some(token) = from_cookie {
        let prefix: String = token.chars().take(16).collect();
        return format!("token:{prefix}");
    }
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .map(|ip| format!("ip:{ip}"))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Pull the session token out of a `Cookie` header value.
pub(crate) fn find_session_token(cookies: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Rate limiting. Returns 429 with `Retry-After` when exceeded.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = rate_key(&req);

    // MutexGuard is !Send — drop before .await via block scope.
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;
        limiter
            .check(&key)
            .map_err(|retry_after| ApiError::RateLimited { retry_after })?;
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_parsed_from_cookie_header() {
        assert_eq!(
            find_session_token("theme=dark; sid=abc123; lang=en"),
            Some("abc123".to_string())
        );
        assert_eq!(find_session_token("sid=xyz"), Some("xyz".to_string()));
        assert_eq!(find_session_token("theme=dark"), None);
        assert_eq!(find_session_token("sid="), None);
    }
}
