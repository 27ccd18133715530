use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::DatabaseError;

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM system_settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO system_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn all_settings(conn: &Connection) -> Result<BTreeMap<String, String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT key, value FROM system_settings ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn defaults_present_and_upsert_overwrites() {
        let conn = open_memory_database().unwrap();
        assert_eq!(
            get_setting(&conn, "site_name").unwrap().as_deref(),
            Some("MedPortal")
        );
        assert!(get_setting(&conn, "missing").unwrap().is_none());

        set_setting(&conn, "site_name", "City Clinic").unwrap();
        set_setting(&conn, "theme", "dark").unwrap();

        let all = all_settings(&conn).unwrap();
        assert_eq!(all.get("site_name").map(String::as_str), Some("City Clinic"));
        assert_eq!(all.get("theme").map(String::as_str), Some("dark"));
    }
}
