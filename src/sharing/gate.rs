//! `AccessGate`: the clinician-facing read path.
//!
//! Resolving is read-only for the token and deliberately not single-use: a
//! valid token resolves any number of times until it expires, and each
//! success appends one access log entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::clock::Clock;
use super::error::ShareError;
use super::records::RecordStore;
use super::store::TokenStore;
use super::token::{hash_client_value, hash_token};
use crate::config::{MIN_RAW_TOKEN_LEN, RECORD_VIEW_LIMIT};
use crate::models::{AccessLogEntry, PatientRecord, ShareToken, TokenStatus};

/// What the clinician's device told us about itself. Hashed before storage.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Bounded record view returned on a successful resolve.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedShare {
    pub patient_id: String,
    pub facility_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub records: Vec<PatientRecord>,
}

pub struct AccessGate {
    tokens: Arc<dyn TokenStore>,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    record_limit: usize,
    min_token_len: usize,
    collapse_expired: bool,
}

impl AccessGate {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            records,
            clock,
            record_limit: RECORD_VIEW_LIMIT,
            min_token_len: MIN_RAW_TOKEN_LEN,
            collapse_expired: false,
        }
    }

    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = limit;
        self
    }

    pub fn with_min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    /// Report expired tokens as `NotFound` rather than `Expired`.
    pub fn with_collapse_expired(mut self, collapse: bool) -> Self {
        self.collapse_expired = collapse;
        self
    }

    /// Resolve a raw token presented by a clinician.
    pub fn resolve(&self, raw_token: &str, client: &ClientInfo) -> Result<ResolvedShare, ShareError> {
        // Length is the only shape check; anything longer goes to the lookup.
        if raw_token.len() < self.min_token_len {
            return Err(ShareError::Malformed);
        }

        let now = self.clock.now();
        let record = self.tokens.get(&hash_token(raw_token))?;
        let token = self.classify(record, now)?;

        self.tokens.append_access(&AccessLogEntry {
            share_token_id: token.id,
            accessed_at: now,
            ip_hash: client.ip.as_deref().map(|ip| hash_client_value("ip", ip)),
            user_agent_hash: client
                .user_agent
                .as_deref()
                .map(|ua| hash_client_value("ua", ua)),
        })?;

        let records = self
            .records
            .recent_records(&token.patient_id, self.record_limit)?;

        tracing::info!(token_id = %token.id, records = records.len(), "Share token resolved");

        Ok(ResolvedShare {
            patient_id: token.patient_id,
            facility_id: token.facility_id,
            expires_at: token.expires_at,
            records,
        })
    }

    fn classify(&self, record: Option<ShareToken>, now: DateTime<Utc>) -> Result<ShareToken, ShareError> {
        let Some(token) = record else {
            tracing::debug!("Share token lookup missed");
            return Err(ShareError::NotFound);
        };
        match token.status_at(now) {
            TokenStatus::Active => Ok(token),
            TokenStatus::Revoked => {
                // Indistinguishable from a token that never existed
                tracing::debug!(token_id = %token.id, "Revoked share token presented");
                Err(ShareError::NotFound)
            }
            TokenStatus::Expired => {
                tracing::debug!(token_id = %token.id, "Expired share token presented");
                if self.collapse_expired {
                    Err(ShareError::NotFound)
                } else {
                    Err(ShareError::Expired)
                }
            }
        }
    }
}
