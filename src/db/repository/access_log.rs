use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_db_time, parse_db_uuid, to_db_time};
use crate::db::DatabaseError;
use crate::models::AccessLogEntry;

/// Append one access entry. The table rejects updates.
pub fn insert_access_entry(conn: &Connection, entry: &AccessLogEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO share_access_log (share_token_id, accessed_at, ip_hash, user_agent_hash)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.share_token_id.to_string(),
            to_db_time(&entry.accessed_at),
            entry.ip_hash,
            entry.user_agent_hash,
        ],
    )?;
    Ok(())
}

/// Access entries for a token, oldest first.
pub fn list_access_entries(
    conn: &Connection,
    share_token_id: &Uuid,
) -> Result<Vec<AccessLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT share_token_id, accessed_at, ip_hash, user_agent_hash
         FROM share_access_log WHERE share_token_id = ?1
         ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![share_token_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(token_id, accessed_at, ip_hash, user_agent_hash)| {
            Ok(AccessLogEntry {
                share_token_id: parse_db_uuid("share_access_log.share_token_id", &token_id)?,
                accessed_at: parse_db_time("share_access_log.accessed_at", &accessed_at)?,
                ip_hash,
                user_agent_hash,
            })
        })
        .collect()
}
