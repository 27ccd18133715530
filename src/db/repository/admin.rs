use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_uuid, to_json, DatabaseError};
use crate::models::Admin;

pub fn insert_admin(conn: &Connection, admin: &Admin) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO admins (id, user_id, first_name, last_name, department, position,
         permissions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            admin.id.to_string(),
            admin.user_id.to_string(),
            admin.first_name,
            admin.last_name,
            admin.department,
            admin.position,
            to_json(&admin.permissions),
            admin.created_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

const SELECT_COLUMNS: &str =
    "id, user_id, first_name, last_name, department, position, permissions, created_at";

pub fn get_admin_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Admin>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM admins WHERE user_id = ?1"),
            params![user_id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(admin_from_row).transpose()
}

struct AdminRow {
    id: String,
    user_id: String,
    first_name: String,
    last_name: String,
    department: String,
    position: String,
    permissions: String,
    created_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AdminRow> {
    Ok(AdminRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        department: row.get(4)?,
        position: row.get(5)?,
        permissions: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn admin_from_row(row: AdminRow) -> Result<Admin, DatabaseError> {
    Ok(Admin {
        id: parse_uuid("admins.id", &row.id)?,
        user_id: parse_uuid("admins.user_id", &row.user_id)?,
        first_name: row.first_name,
        last_name: row.last_name,
        department: row.department,
        position: row.position,
        permissions: from_json("admins.permissions", &row.permissions)?,
        created_at: row.created_at,
    })
}
