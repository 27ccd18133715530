//! In-memory session store. Tokens are opaque 32-byte random strings handed
//! to the client; only their SHA-256 hashes are kept server-side.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

/// Idle sessions expire after this long without a request.
pub const SESSION_IDLE_TTL_SECS: u64 = 12 * 60 * 60;

struct Session {
    user_id: Uuid,
    last_seen: Instant,
}

/// Generate a random session token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a session token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<[u8; 32], Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            ttl: Duration::from_secs(SESSION_IDLE_TTL_SECS),
        }
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Create a session for a user and return the bearer token.
    pub fn create(&mut self, user_id: Uuid) -> String {
        // Periodic sweep when the map grows large.
        if self.sessions.len() > 1000 {
            self.sweep();
        }
        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            Session {
                user_id,
                last_seen: Instant::now(),
            },
        );
        token
    }

    /// Resolve a token to its user, refreshing the idle timer. Expired
    /// sessions are removed on touch.
    pub fn resolve(&mut self, token: &str) -> Option<Uuid> {
        let key = hash_token(token);
        let now = Instant::now();
        match self.sessions.get_mut(&key) {
            Some(session) if now.duration_since(session.last_seen) < self.ttl => {
                session.last_seen = now;
                Some(session.user_id)
            }
            Some(_) => {
                self.sessions.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Revoke one session (logout).
    pub fn revoke(&mut self, token: &str) {
        self.sessions.remove(&hash_token(token));
    }

    /// Revoke every session a user holds. Used when access is withdrawn
    /// out from under a logged-in user (e.g. a doctor losing verification).
    pub fn revoke_user(&mut self, user_id: &Uuid) {
        self.sessions.retain(|_, s| s.user_id != *user_id);
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.sessions
            .retain(|_, s| now.duration_since(s.last_seen) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_resolve_revoke() {
        let mut store = SessionStore::new();
        let user = Uuid::new_v4();
        let token = store.create(user);

        assert_eq!(store.resolve(&token), Some(user));
        store.revoke(&token);
        assert_eq!(store.resolve(&token), None);
    }

    #[test]
    fn unknown_and_tampered_tokens_fail() {
        let mut store = SessionStore::new();
        let token = store.create(Uuid::new_v4());
        assert_eq!(store.resolve("not-a-token"), None);
        assert_eq!(store.resolve(&format!("{token}x")), None);
    }

    #[test]
    fn revoke_user_drops_all_their_sessions() {
        let mut store = SessionStore::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let t1 = store.create(user);
        let t2 = store.create(user);
        let t3 = store.create(other);

        store.revoke_user(&user);
        assert_eq!(store.resolve(&t1), None);
        assert_eq!(store.resolve(&t2), None);
        assert_eq!(store.resolve(&t3), Some(other));
    }

    #[test]
    fn idle_sessions_expire() {
        let mut store = SessionStore::with_ttl(Duration::from_millis(0));
        let token = store.create(Uuid::new_v4());
        assert_eq!(store.resolve(&token), None);
    }

    #[test]
    fn tokens_are_unique_and_opaque() {
        assert_ne!(generate_token(), generate_token());
        let token = generate_token();
        assert!(token.len() >= 43);
        assert_ne!(hash_token(&token).to_vec(), token.as_bytes().to_vec());
    }
}
