pub mod repository;
pub mod sqlite;

pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid JSON in column {column}: {reason}")]
    InvalidJson { column: String, reason: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// Map a rusqlite error, turning UNIQUE/constraint failures into
    /// `ConstraintViolation` so callers can react (slot conflicts,
    /// duplicate identities) instead of treating them as internal faults.
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DatabaseError::ConstraintViolation(
                    msg.clone().unwrap_or_else(|| "constraint violation".into()),
                )
            }
            _ => DatabaseError::Sqlite(err),
        }
    }

    /// Whether this is a UNIQUE-index violation mentioning `index_name`.
    pub fn is_unique_violation(&self, index_name: &str) -> bool {
        matches!(self, DatabaseError::ConstraintViolation(msg) if msg.contains(index_name) || msg.contains("UNIQUE"))
    }
}
