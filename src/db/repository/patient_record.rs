use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{parse_db_time, parse_db_uuid, to_db_time};
use crate::db::DatabaseError;
use crate::models::{PatientRecord, RecordKind};

/// Insert a record summary. Used by the extraction pipeline and by tests.
pub fn insert_patient_record(conn: &Connection, record: &PatientRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patient_records (id, patient_id, kind, title, summary, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id.to_string(),
            record.patient_id,
            record.kind.as_str(),
            record.title,
            record.summary,
            to_db_time(&record.recorded_at),
        ],
    )?;
    Ok(())
}

/// Most recent records for a patient, newest first, at most `limit`.
pub fn recent_records_for_patient(
    conn: &Connection,
    patient_id: &str,
    limit: usize,
) -> Result<Vec<PatientRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, kind, title, summary, recorded_at
         FROM patient_records WHERE patient_id = ?1
         ORDER BY recorded_at DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![patient_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, patient_id, kind, title, summary, recorded_at)| {
            Ok(PatientRecord {
                id: parse_db_uuid("patient_records.id", &id)?,
                patient_id,
                kind: RecordKind::from_str(&kind)?,
                title,
                summary,
                recorded_at: parse_db_time("patient_records.recorded_at", &recorded_at)?,
            })
        })
        .collect()
}
