//! `TokenStore`: the persistence contract shared by both backends.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StoreError;
use crate::models::{AccessLogEntry, ShareToken};

/// Persistence for share tokens and their access log.
///
/// All mutation of token state goes through `insert`, `revoke_*` and
/// `revoke_and_insert`; nothing else writes token rows.
pub trait TokenStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Look up a token by the hash of its raw value.
    fn get(&self, token_hash: &str) -> Result<Option<ShareToken>, StoreError>;

    /// Insert a record as-is.
    fn insert(&self, record: &ShareToken) -> Result<(), StoreError>;

    /// Revoke every token for the patient that is active at `now`, as one
    /// atomic step. Returns the number revoked.
    fn revoke_active_for_patient(&self, patient_id: &str, now: DateTime<Utc>)
        -> Result<usize, StoreError>;

    /// Revoke the patient's active tokens and insert `record`, serialized
    /// against every other issuance for the same patient. Either both steps
    /// take effect or neither does.
    fn revoke_and_insert(&self, record: &ShareToken, now: DateTime<Utc>)
        -> Result<usize, StoreError>;

    /// Append one access log entry for an existing token.
    fn append_access(&self, entry: &AccessLogEntry) -> Result<(), StoreError>;

    /// Access log of a token, oldest first.
    fn access_log(&self, share_token_id: &Uuid) -> Result<Vec<AccessLogEntry>, StoreError>;

    /// Tokens retained for a patient, newest first.
    fn tokens_for_patient(&self, patient_id: &str) -> Result<Vec<ShareToken>, StoreError>;

    /// Drop tokens revoked or expired before `cutoff`, with their access log.
    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}
