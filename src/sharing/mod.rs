//! Ephemeral clinician share links.
//!
//! A patient issues a short-lived token, shown as a QR code; a clinician
//! presents it to read a bounded view of the patient's records without
//! logging in. Components, leaf to root:
//!
//! - `TokenStore` (`store`): persistence, with SQLite and in-process backends
//! - `RevocationManager` (`revocation`): sole writer of `revoked_at`
//! - `TokenIssuer` (`issuer`): mint + revoke-then-insert
//! - `AccessGate` (`gate`): hash, look up, classify, log, return records
//!
//! Only the SHA-256 of a raw token is ever stored.

pub mod clock;
pub mod error;
pub mod gate;
pub mod issuer;
pub mod memory_store;
pub mod qr;
pub mod records;
pub mod revocation;
pub mod service;
pub mod sqlite_store;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ShareError, StoreError};
pub use gate::{AccessGate, ClientInfo, ResolvedShare};
pub use issuer::{IssuedShare, TokenIssuer};
pub use memory_store::MemoryTokenStore;
pub use records::{MemoryRecordStore, RecordStore, SqliteRecordStore};
pub use revocation::RevocationManager;
pub use service::ShareService;
pub use sqlite_store::SqliteTokenStore;
pub use store::TokenStore;
