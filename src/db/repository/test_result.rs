use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_uuid, to_json, DatabaseError};
use crate::models::enums::TestStatus;
use crate::models::TestResult;

pub fn insert_test_result(conn: &Connection, result: &TestResult) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO test_results (id, patient_id, doctor_id, test_name, test_type,
         summary, test_values, status, test_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            result.id.to_string(),
            result.patient_id.to_string(),
            result.doctor_id.to_string(),
            result.test_name,
            result.test_type,
            result.summary,
            to_json(&result.values),
            result.status.as_str(),
            result.test_date,
            result.created_at,
        ],
    )
    .map_err(DatabaseError::from_sqlite)?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, patient_id, doctor_id, test_name, test_type, summary, \
     test_values, status, test_date, created_at";

pub fn get_test_result(conn: &Connection, id: &Uuid) -> Result<Option<TestResult>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM test_results WHERE id = ?1"),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(result_from_row).transpose()
}

pub fn list_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<TestResult>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM test_results
         WHERE patient_id = ?1 ORDER BY test_date DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    rows.map(|r| result_from_row(r?)).collect()
}

pub fn list_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<TestResult>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM test_results
         WHERE doctor_id = ?1 ORDER BY test_date DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], map_row)?;
    rows.map(|r| result_from_row(r?)).collect()
}

pub fn set_status(conn: &Connection, id: &Uuid, status: TestStatus) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE test_results SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "test_result".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct TestResultRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    test_name: String,
    test_type: String,
    summary: Option<String>,
    values: String,
    status: String,
    test_date: NaiveDate,
    created_at: DateTime<Utc>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TestResultRow> {
    Ok(TestResultRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        test_name: row.get(3)?,
        test_type: row.get(4)?,
        summary: row.get(5)?,
        values: row.get(6)?,
        status: row.get(7)?,
        test_date: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn result_from_row(row: TestResultRow) -> Result<TestResult, DatabaseError> {
    Ok(TestResult {
        id: parse_uuid("test_results.id", &row.id)?,
        patient_id: parse_uuid("test_results.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("test_results.doctor_id", &row.doctor_id)?,
        test_name: row.test_name,
        test_type: row.test_type,
        summary: row.summary,
        values: from_json("test_results.test_values", &row.values)?,
        status: parse_enum("test_results.status", &row.status, TestStatus::from_str)?,
        test_date: row.test_date,
        created_at: row.created_at,
    })
}
