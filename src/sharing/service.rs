//! `ShareService`: wires the store, revocation manager, issuer and gate from
//! a `ShareConfig`. The backend is chosen here, once, at construction.

use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::error::StoreError;
use super::gate::AccessGate;
use super::issuer::TokenIssuer;
use super::memory_store::MemoryTokenStore;
use super::records::{MemoryRecordStore, RecordStore, SqliteRecordStore};
use super::revocation::RevocationManager;
use super::sqlite_store::SqliteTokenStore;
use super::store::TokenStore;
use crate::config::ShareConfig;

pub struct ShareService {
    pub config: ShareConfig,
    pub store: Arc<dyn TokenStore>,
    pub revocation: Arc<RevocationManager>,
    pub issuer: TokenIssuer,
    pub gate: AccessGate,
}

impl ShareService {
    /// Build the service with the backend selected by `config.database_path`.
    pub fn from_config(config: ShareConfig) -> Result<Self, StoreError> {
        let (store, records): (Arc<dyn TokenStore>, Arc<dyn RecordStore>) =
            match &config.database_path {
                Some(path) => {
                    let store = SqliteTokenStore::open(path)?;
                    let records = SqliteRecordStore::new(store.shared_connection());
                    tracing::info!(path = %path.display(), "Using SQLite share token store");
                    (Arc::new(store), Arc::new(records))
                }
                None => {
                    tracing::warn!(
                        "No database configured: using in-process share token store \
                         (single instance only)"
                    );
                    (
                        Arc::new(MemoryTokenStore::new(config.history_cap)),
                        Arc::new(MemoryRecordStore::new()),
                    )
                }
            };
        Ok(Self::with_parts(config, store, records, Arc::new(SystemClock)))
    }

    /// Assemble from explicit parts (tests, custom backends).
    pub fn with_parts(
        config: ShareConfig,
        store: Arc<dyn TokenStore>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let revocation = Arc::new(RevocationManager::new(store.clone(), clock.clone()));
        let issuer = TokenIssuer::new(revocation.clone(), clock.clone(), config.ttl());
        let gate = AccessGate::new(store.clone(), records, clock)
            .with_record_limit(config.record_view_limit)
            .with_min_token_len(config.min_token_len)
            .with_collapse_expired(config.collapse_expired);
        Self {
            config,
            store,
            revocation,
            issuer,
            gate,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }
}
