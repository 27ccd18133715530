use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_enum, parse_uuid, DatabaseError};
use crate::models::enums::MedicationSlot;
use crate::models::{AdherenceSummary, MedicationEntry};

/// Toggle a dose for (patient, date, medication, slot): first call creates
/// the row as taken, later calls flip the flag. Returns the row's new state.
pub fn toggle_entry(
    conn: &Connection,
    patient_id: &Uuid,
    date: NaiveDate,
    medication_name: &str,
    slot: MedicationSlot,
    now: DateTime<Utc>,
) -> Result<MedicationEntry, DatabaseError> {
    let existing = find_entry(conn, patient_id, date, medication_name, slot)?;
    match existing {
        Some(mut entry) => {
            entry.taken = !entry.taken;
            entry.updated_at = now;
            conn.execute(
                "UPDATE medication_entries SET taken = ?2, updated_at = ?3 WHERE id = ?1",
                params![entry.id.to_string(), entry.taken as i32, now],
            )?;
            Ok(entry)
        }
        None => {
            let entry = MedicationEntry {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                date,
                medication_name: medication_name.to_string(),
                slot,
                taken: true,
                updated_at: now,
            };
            conn.execute(
                "INSERT INTO medication_entries (id, patient_id, date, medication_name,
                 slot, taken, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.id.to_string(),
                    entry.patient_id.to_string(),
                    entry.date,
                    entry.medication_name,
                    entry.slot.as_str(),
                    entry.taken as i32,
                    entry.updated_at,
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
            Ok(entry)
        }
    }
}

fn find_entry(
    conn: &Connection,
    patient_id: &Uuid,
    date: NaiveDate,
    medication_name: &str,
    slot: MedicationSlot,
) -> Result<Option<MedicationEntry>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, date, medication_name, slot, taken, updated_at
             FROM medication_entries
             WHERE patient_id = ?1 AND date = ?2 AND medication_name = ?3 AND slot = ?4",
            params![patient_id.to_string(), date, medication_name, slot.as_str()],
            map_row,
        )
        .optional()?;
    row.map(entry_from_row).transpose()
}

pub fn list_for_date(
    conn: &Connection,
    patient_id: &Uuid,
    date: NaiveDate,
) -> Result<Vec<MedicationEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, date, medication_name, slot, taken, updated_at
         FROM medication_entries
         WHERE patient_id = ?1 AND date = ?2
         ORDER BY medication_name, slot",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string(), date], map_row)?;
    rows.map(|r| entry_from_row(r?)).collect()
}

/// Adherence over an inclusive date range.
pub fn adherence(
    conn: &Connection,
    patient_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<AdherenceSummary, DatabaseError> {
    let (total, taken): (u32, u32) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(taken), 0) FROM medication_entries
         WHERE patient_id = ?1 AND date >= ?2 AND date <= ?3",
        params![patient_id.to_string(), from, to],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(AdherenceSummary::new(total, taken))
}

struct EntryRow {
    id: String,
    patient_id: String,
    date: NaiveDate,
    medication_name: String,
    slot: String,
    taken: i32,
    updated_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        date: row.get(2)?,
        medication_name: row.get(3)?,
        slot: row.get(4)?,
        taken: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn entry_from_row(row: EntryRow) -> Result<MedicationEntry, DatabaseError> {
    Ok(MedicationEntry {
        id: parse_uuid("medication_entries.id", &row.id)?,
        patient_id: parse_uuid("medication_entries.patient_id", &row.patient_id)?,
        date: row.date,
        medication_name: row.medication_name,
        slot: parse_enum(
            "medication_entries.slot",
            &row.slot,
            MedicationSlot::from_str,
        )?,
        taken: row.taken != 0,
        updated_at: row.updated_at,
    })
}
