//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::app_state::AppState;
use crate::models::{Profile, User};

pub const SESSION_COOKIE: &str = "sid";

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub app: Arc<AppState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(app: Arc<AppState>) -> Self {
        Self {
            app,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Request contexts — injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// A resolved session: who is making the request and with which token.
/// Injected by `require_session` and the portal middlewares.
#[derive(Clone)]
pub struct SessionContext {
    pub user: User,
    pub token: String,
}

/// A gated portal request: the identity plus its role profile.
/// Injected by `require_patient` / `require_doctor` / `require_admin`.
#[derive(Clone)]
pub struct PortalContext {
    pub user: User,
    pub profile: Profile,
}

// ═══════════════════════════════════════════════════════════
// Cookie helpers
// ═══════════════════════════════════════════════════════════

/// `Set-Cookie` value issuing a session token.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/")
}

/// `Set-Cookie` value clearing the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

// ═══════════════════════════════════════════════════════════
// Rate limiter — per-caller sliding window
// ═══════════════════════════════════════════════════════════

/// Keys (caller-supplied, via forwarded IPs) must not accumulate without
/// bound; once the map grows past this, fully-expired callers are dropped.
const MAX_TRACKED_CALLERS: usize = 1000;

/// Per-caller rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            per_minute: 100,
            per_hour: 1000,
        }
    }

    #[cfg(test)]
    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a caller is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        if self.windows.len() > MAX_TRACKED_CALLERS {
            self.sweep(now);
        }
        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }
        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Drop callers whose whole window has expired.
    fn sweep(&mut self, now: Instant) {
        self.windows.retain(|_, entries| {
            entries
                .iter()
                .any(|ts| now.duration_since(*ts) < Duration::from_secs(3600))
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
