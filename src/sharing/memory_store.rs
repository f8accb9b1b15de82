//! In-process `TokenStore` for deployments without a database.
//!
//! Tokens are indexed by hash for O(1) lookup, plus a per-patient history
//! capped at `history_cap` entries; older tokens are evicted together with
//! their access log. Issuance for one patient is serialized by a per-patient
//! mutex, so different patients never wait on each other.
//!
//! State lives in this process only. Running more than one instance against
//! separate `MemoryTokenStore`s breaks the single-active-token guarantee;
//! use the SQLite backend for anything but a single process.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StoreError;
use super::store::TokenStore;
use crate::models::{AccessLogEntry, ShareToken};

/// Prune idle per-key locks once the table grows past this size.
const KEYED_LOCKS_CLEANUP_THRESHOLD: usize = 1024;

// ═══════════════════════════════════════════════════════════
// Per-key mutual exclusion
// ═══════════════════════════════════════════════════════════

/// A table of mutexes keyed by string, handed out as `Arc`s so the table
/// lock is only held while looking one up.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutex for `key`.
    pub fn handle(&self, key: &str) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::LockPoisoned)?;
        if locks.len() > KEYED_LOCKS_CLEANUP_THRESHOLD {
            // Only this table holds an idle lock
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════
// MemoryTokenStore
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
struct MemoryState {
    by_hash: HashMap<String, ShareToken>,
    hash_by_id: HashMap<Uuid, String>,
    /// Token hashes per patient, oldest first.
    by_patient: HashMap<String, VecDeque<String>>,
    access_log: HashMap<Uuid, Vec<AccessLogEntry>>,
}

impl MemoryState {
    fn revoke_active(&mut self, patient_id: &str, now: DateTime<Utc>) -> usize {
        let Some(hashes) = self.by_patient.get(patient_id) else {
            return 0;
        };
        let mut revoked = 0;
        for hash in hashes {
            if let Some(token) = self.by_hash.get_mut(hash) {
                if token.revoked_at.is_none() && token.expires_at > now {
                    token.revoked_at = Some(now);
                    revoked += 1;
                }
            }
        }
        revoked
    }

    fn insert(&mut self, record: &ShareToken, history_cap: usize) -> Result<(), StoreError> {
        if self.by_hash.contains_key(&record.token_hash) || self.hash_by_id.contains_key(&record.id) {
            return Err(StoreError::DuplicateHash);
        }
        self.by_hash
            .insert(record.token_hash.clone(), record.clone());
        self.hash_by_id.insert(record.id, record.token_hash.clone());

        let history = self
            .by_patient
            .entry(record.patient_id.clone())
            .or_default();
        history.push_back(record.token_hash.clone());

        let mut evicted = Vec::new();
        while history.len() > history_cap {
            if let Some(oldest) = history.pop_front() {
                evicted.push(oldest);
            }
        }
        for hash in evicted {
            self.remove_hash(&hash);
        }
        Ok(())
    }

    fn remove_hash(&mut self, hash: &str) {
        if let Some(token) = self.by_hash.remove(hash) {
            self.hash_by_id.remove(&token.id);
            self.access_log.remove(&token.id);
        }
    }
}

/// Single-process token store. See module docs for deployment limits.
pub struct MemoryTokenStore {
    state: Mutex<MemoryState>,
    patient_locks: KeyedLocks,
    history_cap: usize,
}

impl MemoryTokenStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            patient_locks: KeyedLocks::new(),
            history_cap: history_cap.max(1),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Number of tokens currently held across all patients.
    pub fn len(&self) -> usize {
        self.state().map(|s| s.by_hash.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new(crate::config::TOKEN_HISTORY_CAP)
    }
}

impl TokenStore for MemoryTokenStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn get(&self, token_hash: &str) -> Result<Option<ShareToken>, StoreError> {
        Ok(self.state()?.by_hash.get(token_hash).cloned())
    }

    fn insert(&self, record: &ShareToken) -> Result<(), StoreError> {
        let lock = self.patient_locks.handle(&record.patient_id)?;
        let _patient = lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.state()?.insert(record, self.history_cap)
    }

    fn revoke_active_for_patient(
        &self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let lock = self.patient_locks.handle(patient_id)?;
        let _patient = lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(self.state()?.revoke_active(patient_id, now))
    }

    fn revoke_and_insert(
        &self,
        record: &ShareToken,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let lock = self.patient_locks.handle(&record.patient_id)?;
        let _patient = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut state = self.state()?;
        if state.by_hash.contains_key(&record.token_hash) {
            // Checked before revoking so a failed insert leaves no trace
            return Err(StoreError::DuplicateHash);
        }
        let revoked = state.revoke_active(&record.patient_id, now);
        state.insert(record, self.history_cap)?;
        Ok(revoked)
    }

    fn append_access(&self, entry: &AccessLogEntry) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if !state.hash_by_id.contains_key(&entry.share_token_id) {
            return Err(StoreError::UnknownToken(entry.share_token_id));
        }
        state
            .access_log
            .entry(entry.share_token_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn access_log(&self, share_token_id: &Uuid) -> Result<Vec<AccessLogEntry>, StoreError> {
        Ok(self
            .state()?
            .access_log
            .get(share_token_id)
            .cloned()
            .unwrap_or_default())
    }

    fn tokens_for_patient(&self, patient_id: &str) -> Result<Vec<ShareToken>, StoreError> {
        let state = self.state()?;
        let Some(hashes) = state.by_patient.get(patient_id) else {
            return Ok(Vec::new());
        };
        Ok(hashes
            .iter()
            .rev()
            .filter_map(|hash| state.by_hash.get(hash).cloned())
            .collect())
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state()?;
        let stale: HashSet<String> = state
            .by_hash
            .values()
            .filter(|t| t.revoked_at.is_some_and(|r| r < cutoff) || t.expires_at < cutoff)
            .map(|t| t.token_hash.clone())
            .collect();

        for hash in &stale {
            state.remove_hash(hash);
        }
        for history in state.by_patient.values_mut() {
            history.retain(|h| !stale.contains(h));
        }
        state.by_patient.retain(|_, history| !history.is_empty());
        Ok(stale.len())
    }
}
