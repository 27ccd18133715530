use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_uuid, to_json, DatabaseError};
use crate::models::enums::{Priority, TipSource, TipStatus};
use crate::models::{HealthTip, TipReaction};

pub fn insert_tip(conn: &Connection, tip: &HealthTip) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_tips (id, title, summary, content, category, tags, priority,
         status, featured, source, patient_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            tip.id.to_string(),
            tip.title,
            tip.summary,
            tip.content,
            tip.category,
            to_json(&tip.tags),
            tip.priority.as_str(),
            tip.status.as_str(),
            tip.featured as i32,
            tip.source.as_str(),
            tip.patient_id.map(|id| id.to_string()),
            tip.created_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, title, summary, content, category, tags, priority, \
     status, featured, source, patient_id, created_at";

pub fn get_tip(conn: &Connection, id: &Uuid) -> Result<Option<HealthTip>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM health_tips WHERE id = ?1"),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(tip_from_row).transpose()
}

/// Tips visible to one patient: published general tips plus their own
/// personalized ones, newest first.
pub fn list_visible_to_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<HealthTip>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM health_tips
         WHERE status = 'published' AND (patient_id IS NULL OR patient_id = ?1)
         ORDER BY featured DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    rows.map(|r| tip_from_row(r?)).collect()
}

/// Every tip regardless of status — the admin management view.
pub fn list_all(conn: &Connection) -> Result<Vec<HealthTip>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM health_tips ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    rows.map(|r| tip_from_row(r?)).collect()
}

pub struct TipUpdate {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub featured: bool,
}

pub fn update_tip(conn: &Connection, id: &Uuid, update: &TipUpdate) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE health_tips SET title = ?2, summary = ?3, content = ?4, category = ?5,
         tags = ?6, priority = ?7, featured = ?8
         WHERE id = ?1",
        params![
            id.to_string(),
            update.title,
            update.summary,
            update.content,
            update.category,
            to_json(&update.tags),
            update.priority.as_str(),
            update.featured as i32,
        ],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn set_status(conn: &Connection, id: &Uuid, status: TipStatus) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE health_tips SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn delete_tip(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM health_tips WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn not_found(id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "health_tip".into(),
        id: id.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════
// Reactions
// ═══════════════════════════════════════════════════════════

pub fn get_reaction(
    conn: &Connection,
    tip_id: &Uuid,
    patient_id: &Uuid,
) -> Result<TipReaction, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT liked, bookmarked FROM health_tip_reactions
             WHERE tip_id = ?1 AND patient_id = ?2",
            params![tip_id.to_string(), patient_id.to_string()],
            |row| {
                Ok(TipReaction {
                    liked: row.get::<_, i32>(0)? != 0,
                    bookmarked: row.get::<_, i32>(1)? != 0,
                })
            },
        )
        .optional()?;
    Ok(row.unwrap_or_default())
}

/// Flip the patient's like flag for a tip. Returns the new reaction state.
pub fn toggle_like(
    conn: &Connection,
    tip_id: &Uuid,
    patient_id: &Uuid,
) -> Result<TipReaction, DatabaseError> {
    let mut reaction = get_reaction(conn, tip_id, patient_id)?;
    reaction.liked = !reaction.liked;
    upsert_reaction(conn, tip_id, patient_id, &reaction)?;
    Ok(reaction)
}

/// Flip the patient's bookmark flag for a tip. Returns the new reaction state.
pub fn toggle_bookmark(
    conn: &Connection,
    tip_id: &Uuid,
    patient_id: &Uuid,
) -> Result<TipReaction, DatabaseError> {
    let mut reaction = get_reaction(conn, tip_id, patient_id)?;
    reaction.bookmarked = !reaction.bookmarked;
    upsert_reaction(conn, tip_id, patient_id, &reaction)?;
    Ok(reaction)
}

fn upsert_reaction(
    conn: &Connection,
    tip_id: &Uuid,
    patient_id: &Uuid,
    reaction: &TipReaction,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_tip_reactions (tip_id, patient_id, liked, bookmarked)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (tip_id, patient_id)
         DO UPDATE SET liked = excluded.liked, bookmarked = excluded.bookmarked",
        params![
            tip_id.to_string(),
            patient_id.to_string(),
            reaction.liked as i32,
            reaction.bookmarked as i32,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

pub fn like_count(conn: &Connection, tip_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM health_tip_reactions WHERE tip_id = ?1 AND liked = 1",
        params![tip_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct TipRow {
    id: String,
    title: String,
    summary: String,
    content: String,
    category: String,
    tags: String,
    priority: String,
    status: String,
    featured: i32,
    source: String,
    patient_id: Option<String>,
    created_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TipRow> {
    Ok(TipRow {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        content: row.get(3)?,
        category: row.get(4)?,
        tags: row.get(5)?,
        priority: row.get(6)?,
        status: row.get(7)?,
        featured: row.get(8)?,
        source: row.get(9)?,
        patient_id: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn tip_from_row(row: TipRow) -> Result<HealthTip, DatabaseError> {
    Ok(HealthTip {
        id: parse_uuid("health_tips.id", &row.id)?,
        title: row.title,
        summary: row.summary,
        content: row.content,
        category: row.category,
        tags: from_json("health_tips.tags", &row.tags)?,
        priority: parse_enum("health_tips.priority", &row.priority, Priority::from_str)?,
        status: parse_enum("health_tips.status", &row.status, TipStatus::from_str)?,
        featured: row.featured != 0,
        source: parse_enum("health_tips.source", &row.source, TipSource::from_str)?,
        patient_id: row
            .patient_id
            .as_deref()
            .map(|s| parse_uuid("health_tips.patient_id", s))
            .transpose()?,
        created_at: row.created_at,
    })
}
