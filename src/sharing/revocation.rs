//! `RevocationManager`: the only writer of `revoked_at`.
//!
//! Expiry needs no active component; it is a read-time comparison in the
//! access gate. This manager handles explicit revocation, the revoke half
//! of issuance, and optional compaction.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::clock::Clock;
use super::error::{ShareError, StoreError};
use super::store::TokenStore;
use crate::models::ShareToken;

pub struct RevocationManager {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl RevocationManager {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Kill any outstanding capability for the patient (e.g. on logout).
    pub fn revoke_active_for_patient(&self, patient_id: &str) -> Result<usize, ShareError> {
        let revoked = self
            .store
            .revoke_active_for_patient(patient_id, self.clock.now())?;
        if revoked > 0 {
            tracing::info!(patient_id, revoked, "Share tokens revoked");
        }
        Ok(revoked)
    }

    /// Revoke the patient's active tokens, then insert `record`, as one unit.
    ///
    /// Not retried here: on failure nothing was written and the caller
    /// repeats the whole issuance.
    pub fn revoke_then_insert(&self, record: &ShareToken) -> Result<usize, StoreError> {
        let revoked = self.store.revoke_and_insert(record, record.issued_at)?;
        if revoked > 0 {
            tracing::debug!(
                patient_id = %record.patient_id,
                revoked,
                "Previous share token revoked by new issuance"
            );
        }
        Ok(revoked)
    }

    /// Physically remove tokens that ended more than `retention` ago.
    /// Housekeeping only; correctness never depends on it.
    pub fn compact(&self, retention: std::time::Duration) -> Result<usize, ShareError> {
        let cutoff = prune_cutoff(self.clock.now(), retention);
        let removed = self.store.prune(cutoff)?;
        tracing::info!(removed, backend = self.store.backend(), "Share token compaction finished");
        Ok(removed)
    }
}

/// Instant before which a revoked/expired token is eligible for pruning.
pub fn prune_cutoff(now: DateTime<Utc>, retention: std::time::Duration) -> DateTime<Utc> {
    now - Duration::from_std(retention).unwrap_or_else(|_| Duration::days(90))
}
