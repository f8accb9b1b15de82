//! Function-based repositories over a `rusqlite::Connection`.
//!
//! Timestamps are stored as RFC 3339 UTC text with fixed millisecond
//! precision so that SQL string comparison orders them chronologically.

pub mod access_log;
pub mod patient_record;
pub mod share_token;

pub use access_log::*;
pub use patient_record::*;
pub use share_token::*;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::db::DatabaseError;

/// Format a timestamp for storage.
pub fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
pub fn parse_db_time(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidValue {
            field: field.into(),
            value: value.into(),
        })
}

/// Parse a stored UUID.
pub fn parse_db_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}
