//! Repository functions for the `share_tokens` table.
//!
//! Rows are only ever inserted, revoked once, or pruned by compaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_db_time, parse_db_uuid, to_db_time};
use crate::db::DatabaseError;
use crate::models::ShareToken;

const SHARE_TOKEN_COLUMNS: &str =
    "id, patient_id, facility_id, token_hash, issued_at, expires_at, revoked_at";

/// Raw row before timestamp/UUID parsing.
struct ShareTokenRow {
    id: String,
    patient_id: String,
    facility_id: Option<String>,
    token_hash: String,
    issued_at: String,
    expires_at: String,
    revoked_at: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareTokenRow> {
    Ok(ShareTokenRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        facility_id: row.get(2)?,
        token_hash: row.get(3)?,
        issued_at: row.get(4)?,
        expires_at: row.get(5)?,
        revoked_at: row.get(6)?,
    })
}

fn token_from_row(row: ShareTokenRow) -> Result<ShareToken, DatabaseError> {
    Ok(ShareToken {
        id: parse_db_uuid("share_tokens.id", &row.id)?,
        patient_id: row.patient_id,
        facility_id: row.facility_id,
        token_hash: row.token_hash,
        issued_at: parse_db_time("share_tokens.issued_at", &row.issued_at)?,
        expires_at: parse_db_time("share_tokens.expires_at", &row.expires_at)?,
        revoked_at: row
            .revoked_at
            .as_deref()
            .map(|ts| parse_db_time("share_tokens.revoked_at", ts))
            .transpose()?,
    })
}

/// Insert a new share token row.
pub fn insert_share_token(conn: &Connection, token: &ShareToken) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO share_tokens (id, patient_id, facility_id, token_hash, issued_at, expires_at, revoked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            token.id.to_string(),
            token.patient_id,
            token.facility_id,
            token.token_hash,
            to_db_time(&token.issued_at),
            to_db_time(&token.expires_at),
            token.revoked_at.as_ref().map(to_db_time),
        ],
    )?;
    Ok(())
}

/// Look up a token by the hash of its raw value.
pub fn get_share_token_by_hash(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<ShareToken>, DatabaseError> {
    let sql = format!("SELECT {SHARE_TOKEN_COLUMNS} FROM share_tokens WHERE token_hash = ?1");
    let row = conn
        .query_row(&sql, params![token_hash], read_row)
        .optional()?;
    row.map(token_from_row).transpose()
}

/// Revoke every token for the patient that is still active at `now`.
///
/// A single conditional UPDATE, so it never races a read-then-write.
pub fn revoke_active_share_tokens(
    conn: &Connection,
    patient_id: &str,
    now: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let now = to_db_time(now);
    let revoked = conn.execute(
        "UPDATE share_tokens SET revoked_at = ?2
         WHERE patient_id = ?1 AND revoked_at IS NULL AND expires_at > ?2",
        params![patient_id, now],
    )?;
    Ok(revoked)
}

/// All tokens ever issued to a patient, newest first.
pub fn list_share_tokens_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<ShareToken>, DatabaseError> {
    let sql = format!(
        "SELECT {SHARE_TOKEN_COLUMNS} FROM share_tokens
         WHERE patient_id = ?1
         ORDER BY issued_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![patient_id], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(token_from_row).collect()
}

/// Count tokens for a patient that are active at `now`.
pub fn count_active_share_tokens(
    conn: &Connection,
    patient_id: &str,
    now: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM share_tokens
         WHERE patient_id = ?1 AND revoked_at IS NULL AND expires_at > ?2",
        params![patient_id, to_db_time(now)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Delete tokens that were revoked or expired before `cutoff`, along with
/// their access log rows. Returns the number of tokens removed.
pub fn prune_share_tokens(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let cutoff = to_db_time(cutoff);
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM share_access_log WHERE share_token_id IN (
             SELECT id FROM share_tokens
             WHERE (revoked_at IS NOT NULL AND revoked_at < ?1) OR expires_at < ?1
         )",
        params![cutoff],
    )?;
    let removed = tx.execute(
        "DELETE FROM share_tokens
         WHERE (revoked_at IS NOT NULL AND revoked_at < ?1) OR expires_at < ?1",
        params![cutoff],
    )?;
    tx.commit()?;
    Ok(removed)
}
