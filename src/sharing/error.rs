//! Error taxonomy for the share-token system.

use thiserror::Error;

use crate::db::DatabaseError;

/// Failures from a `TokenStore` or `RecordStore` backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Token hash already present")]
    DuplicateHash,

    #[error("Unknown share token: {0}")]
    UnknownToken(uuid::Uuid),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlite(err))
    }
}

/// Outcome of an issue or resolve call that did not succeed.
///
/// `Malformed`, `NotFound` and `Expired` are expected results, not faults.
/// A revoked token surfaces as `NotFound`.
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Malformed share token")]
    Malformed,

    #[error("Share token not found")]
    NotFound,

    #[error("Share token expired")]
    Expired,
}
