use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_enum, parse_uuid, DatabaseError};
use crate::models::enums::Portal;
use crate::models::User;

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, username, portal, password_hash, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id.to_string(),
            user.email,
            user.username,
            user.portal.as_str(),
            user.password_hash,
            user.active as i32,
            user.created_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, email, username, portal, password_hash, active, created_at
             FROM users WHERE id = ?1",
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Lookup by username OR email — the credential store's login resolution.
pub fn find_by_login_or_email(
    conn: &Connection,
    login: &str,
) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, email, username, portal, password_hash, active, created_at
             FROM users WHERE username = ?1 OR email = ?1",
            params![login],
            map_row,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn update_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![id.to_string(), password_hash],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "user".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn count_by_portal(conn: &Connection, portal: Portal) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE portal = ?1",
        params![portal.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Delete an identity; profile and owned records cascade.
pub fn delete_user(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

struct UserRow {
    id: String,
    email: String,
    username: String,
    portal: String,
    password_hash: String,
    active: i32,
    created_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        portal: row.get(3)?,
        password_hash: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: parse_uuid("users.id", &row.id)?,
        email: row.email,
        username: row.username,
        portal: parse_enum("users.portal", &row.portal, Portal::from_str)?,
        password_hash: row.password_hash,
        active: row.active != 0,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::testutil::make_user;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let user = make_user(Portal::Patient, "asha");
        insert_user(&conn, &user).unwrap();

        let loaded = get_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(loaded.email, "asha@example.com");
        assert_eq!(loaded.portal, Portal::Patient);
        assert!(loaded.active);
    }

    #[test]
    fn find_by_username_or_email() {
        let conn = open_memory_database().unwrap();
        let user = make_user(Portal::Doctor, "ravi");
        insert_user(&conn, &user).unwrap();

        assert!(find_by_login_or_email(&conn, "ravi").unwrap().is_some());
        assert!(find_by_login_or_email(&conn, "ravi@example.com")
            .unwrap()
            .is_some());
        assert!(find_by_login_or_email(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_constraint_violation() {
        let conn = open_memory_database().unwrap();
        let a = make_user(Portal::Patient, "dup");
        insert_user(&conn, &a).unwrap();

        let mut b = make_user(Portal::Patient, "dup2");
        b.email = a.email.clone();
        let err = insert_user(&conn, &b).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn count_by_portal_counts_only_that_portal() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &make_user(Portal::Patient, "p1")).unwrap();
        insert_user(&conn, &make_user(Portal::Admin, "a1")).unwrap();

        assert_eq!(count_by_portal(&conn, Portal::Patient).unwrap(), 1);
        assert_eq!(count_by_portal(&conn, Portal::Admin).unwrap(), 1);
        assert_eq!(count_by_portal(&conn, Portal::Doctor).unwrap(), 0);
    }

    #[test]
    fn update_password_hash_missing_user_errors() {
        let conn = open_memory_database().unwrap();
        let err = update_password_hash(&conn, &uuid::Uuid::new_v4(), "x").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
