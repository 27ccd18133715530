//! Process-wide shared state behind the HTTP layer: the database path,
//! the in-memory session store, and the tips provider client.

use std::path::PathBuf;
use std::sync::RwLock;

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::db::{self, DatabaseError};
use crate::tips::TipsClient;

#[derive(Error, Debug)]
pub enum StateError {
    /// A lock poisoned by a panicked holder. Treated as internal.
    #[error("state lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub struct AppState {
    db_path: PathBuf,
    sessions: RwLock<SessionStore>,
    pub tips: TipsClient,
}

impl AppState {
    pub fn new(db_path: PathBuf, tips: TipsClient) -> Self {
        Self {
            db_path,
            sessions: RwLock::new(SessionStore::new()),
            tips,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.db_path.clone(),
            TipsClient::new(&config.tips_url, &config.tips_model, config.tips_timeout_secs),
        )
    }

    /// Open a connection for the current request. SQLite with WAL and a
    /// busy timeout handles the concurrency; no pool is kept.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        db::connect(&self.db_path)
    }

    pub fn create_session(&self, user_id: Uuid) -> Result<String, StateError> {
        let mut sessions = self.sessions.write().map_err(|_| StateError::LockPoisoned)?;
        Ok(sessions.create(user_id))
    }

    pub fn resolve_session(&self, token: &str) -> Result<Option<Uuid>, StateError> {
        let mut sessions = self.sessions.write().map_err(|_| StateError::LockPoisoned)?;
        Ok(sessions.resolve(token))
    }

    pub fn revoke_session(&self, token: &str) -> Result<(), StateError> {
        let mut sessions = self.sessions.write().map_err(|_| StateError::LockPoisoned)?;
        sessions.revoke(token);
        Ok(())
    }

    pub fn revoke_user_sessions(&self, user_id: &Uuid) -> Result<(), StateError> {
        let mut sessions = self.sessions.write().map_err(|_| StateError::LockPoisoned)?;
        sessions.revoke_user(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_database;

    #[test]
    fn session_lifecycle_through_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        open_database(&path).unwrap();
        let state = AppState::new(path, TipsClient::new("http://localhost:11434", "m", 5));

        let user = Uuid::new_v4();
        let token = state.create_session(user).unwrap();
        assert_eq!(state.resolve_session(&token).unwrap(), Some(user));

        state.revoke_user_sessions(&user).unwrap();
        assert_eq!(state.resolve_session(&token).unwrap(), None);

        // And the DB path is usable per request.
        let conn = state.open_db().unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }
}
