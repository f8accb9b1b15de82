//! `RecordStore`: the bounded "most recent records" query consumed by the
//! access gate. Records themselves are written by the extraction pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rusqlite::Connection;

use super::error::StoreError;
use crate::db::repository;
use crate::models::PatientRecord;

pub trait RecordStore: Send + Sync {
    /// Up to `limit` records for the patient, newest first.
    fn recent_records(&self, patient_id: &str, limit: usize)
        -> Result<Vec<PatientRecord>, StoreError>;
}

/// Reads `patient_records` from the share database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Store a record summary. The extraction pipeline owns this write path.
    pub fn add(&self, record: &PatientRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(repository::insert_patient_record(&conn, record)?)
    }
}

impl RecordStore for SqliteRecordStore {
    fn recent_records(
        &self,
        patient_id: &str,
        limit: usize,
    ) -> Result<Vec<PatientRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(repository::recent_records_for_patient(&conn, patient_id, limit)?)
    }
}

/// In-process record store for the ephemeral deployment and tests.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, Vec<PatientRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, record: PatientRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        records
            .entry(record.patient_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }
}

impl RecordStore for MemoryRecordStore {
    fn recent_records(
        &self,
        patient_id: &str,
        limit: usize,
    ) -> Result<Vec<PatientRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut recent = records.get(patient_id).cloned().unwrap_or_default();
        recent.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        recent.truncate(limit);
        Ok(recent)
    }
}
