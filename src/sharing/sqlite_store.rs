//! Durable `TokenStore` backed by SQLite.
//!
//! Revoke-then-insert runs inside a `BEGIN IMMEDIATE` transaction, which
//! takes the database write lock before the revoke and holds it through the
//! insert. Concurrent issuers, in this process or another one sharing the
//! file, queue behind it (bounded by the connection's busy timeout).

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use super::error::StoreError;
use super::store::TokenStore;
use crate::db::{self, repository};
use crate::models::{AccessLogEntry, ShareToken};

/// SQLite-backed token store.
#[derive(Clone)]
pub struct SqliteTokenStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTokenStore {
    /// Open a file-backed store, running migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open_database(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = db::open_memory_database()?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// The shared connection, for collaborators that read the same database
    /// (the record store).
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Tokens for the patient active at `now`; used to check the
    /// single-active-token invariant.
    pub fn count_active(&self, patient_id: &str, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        Ok(repository::count_active_share_tokens(&conn, patient_id, &now)?)
    }
}

impl TokenStore for SqliteTokenStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, token_hash: &str) -> Result<Option<ShareToken>, StoreError> {
        let conn = self.conn()?;
        Ok(repository::get_share_token_by_hash(&conn, token_hash)?)
    }

    fn insert(&self, record: &ShareToken) -> Result<(), StoreError> {
        let conn = self.conn()?;
        repository::insert_share_token(&conn, record).map_err(map_insert_error)
    }

    fn revoke_active_for_patient(
        &self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        Ok(repository::revoke_active_share_tokens(&conn, patient_id, &now)?)
    }

    fn revoke_and_insert(
        &self,
        record: &ShareToken,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let revoked = repository::revoke_active_share_tokens(&tx, &record.patient_id, &now)?;
        repository::insert_share_token(&tx, record).map_err(map_insert_error)?;
        // Dropping an uncommitted transaction rolls back the revoke
        tx.commit()?;
        Ok(revoked)
    }

    fn append_access(&self, entry: &AccessLogEntry) -> Result<(), StoreError> {
        let conn = self.conn()?;
        repository::insert_access_entry(&conn, entry).map_err(|e| match e {
            db::DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::UnknownToken(entry.share_token_id)
            }
            other => StoreError::Database(other),
        })
    }

    fn access_log(&self, share_token_id: &Uuid) -> Result<Vec<AccessLogEntry>, StoreError> {
        let conn = self.conn()?;
        Ok(repository::list_access_entries(&conn, share_token_id)?)
    }

    fn tokens_for_patient(&self, patient_id: &str) -> Result<Vec<ShareToken>, StoreError> {
        let conn = self.conn()?;
        Ok(repository::list_share_tokens_for_patient(&conn, patient_id)?)
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        Ok(repository::prune_share_tokens(&conn, &cutoff)?)
    }
}

fn map_insert_error(err: db::DatabaseError) -> StoreError {
    match err {
        db::DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateHash
        }
        other => StoreError::Database(other),
    }
}
