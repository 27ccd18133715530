use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

/// Open a SQLite connection to the given path and run migrations.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open a connection to an already-migrated database. Used for
/// per-request connections after startup ran `open_database`.
pub fn connect(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(())
}

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_initial.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet).
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

/// Count tables in the database (for verification).
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        // 11 entity tables + schema_version = 12
        let count = count_tables(&conn).unwrap();
        assert!(count >= 12, "Expected at least 12 tables, got {count}");
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        assert!(run_migrations(&conn).is_ok());
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn slot_index_blocks_duplicate_non_terminal_rows() {
        let conn = open_memory_database().unwrap();
        // Raw inserts bypassing the scheduler still cannot double-book.
        conn.execute_batch(
            "INSERT INTO users (id, email, username, portal, password_hash, created_at)
             VALUES ('u1', 'p@x.com', 'p1', 'patient', 'h', '2025-01-01'),
                    ('u2', 'd@x.com', 'd1', 'doctor', 'h', '2025-01-01');
             INSERT INTO patients (id, user_id, first_name, last_name, phone, date_of_birth, gender, created_at)
             VALUES ('p1', 'u1', 'A', 'B', '1234567890', '1990-01-01', 'other', '2025-01-01');
             INSERT INTO doctors (id, user_id, first_name, last_name, phone, date_of_birth, gender, is_verified, created_at)
             VALUES ('d1', 'u2', 'C', 'D', '1234567890', '1980-01-01', 'other', 1, '2025-01-01');
             INSERT INTO appointments (id, patient_id, doctor_id, date, time, reason, created_at, updated_at)
             VALUES ('a1', 'p1', 'd1', '2025-03-10', '10:00', 'checkup', '2025-01-01', '2025-01-01');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO appointments (id, patient_id, doctor_id, date, time, reason, created_at, updated_at)
             VALUES ('a2', 'p1', 'd1', '2025-03-10', '10:00', 'cough', '2025-01-01', '2025-01-01')",
            [],
        );
        assert!(dup.is_err());

        // Cancelling frees the slot for a new booking.
        conn.execute("UPDATE appointments SET status = 'cancelled' WHERE id = 'a1'", [])
            .unwrap();
        conn.execute(
            "INSERT INTO appointments (id, patient_id, doctor_id, date, time, reason, created_at, updated_at)
             VALUES ('a3', 'p1', 'd1', '2025-03-10', '10:00', 'cough', '2025-01-01', '2025-01-01')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn default_settings_seeded() {
        let conn = open_memory_database().unwrap();
        let site: String = conn
            .query_row(
                "SELECT value FROM system_settings WHERE key = 'site_name'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(site, "MedPortal");
    }
}
