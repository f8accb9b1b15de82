//! `TokenIssuer`: mints a raw token, stores only its hash, and makes it the
//! patient's single active token.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::clock::Clock;
use super::error::ShareError;
use super::revocation::RevocationManager;
use super::token::{generate_raw_token, hash_token};
use crate::config::MAX_IDENTIFIER_LEN;
use crate::models::ShareToken;

/// Result of a successful issue. The raw token exists only here.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedShare {
    #[serde(rename = "token")]
    pub raw_token: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedShare")
            .field("raw_token", &"<redacted>")
            .field("token_id", &self.token_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub struct TokenIssuer {
    revocation: Arc<RevocationManager>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(revocation: Arc<RevocationManager>, clock: Arc<dyn Clock>, ttl: chrono::Duration) -> Self {
        Self {
            revocation,
            clock,
            ttl,
        }
    }

    /// Issue a new share token for an already-authenticated patient.
    ///
    /// Revokes whatever token the patient had active. Calling it twice is
    /// safe, but the first token stops working.
    pub fn issue(&self, patient_id: &str, facility_id: Option<&str>) -> Result<IssuedShare, ShareError> {
        let patient_id = validate_identifier("patient_id", patient_id)?;
        let facility_id = facility_id
            .map(|f| validate_identifier("facility_id", f))
            .transpose()?;

        let raw_token = generate_raw_token();
        let record = ShareToken::new(
            patient_id,
            facility_id,
            hash_token(&raw_token),
            self.clock.now(),
            self.ttl,
        );

        let revoked = self.revocation.revoke_then_insert(&record)?;

        tracing::info!(
            patient_id = %record.patient_id,
            token_id = %record.id,
            revoked,
            expires_at = %record.expires_at,
            "Share token issued"
        );

        Ok(IssuedShare {
            raw_token,
            token_id: record.id,
            expires_at: record.expires_at,
        })
    }
}

/// Trim and check an identifier: 1..=128 chars of `[A-Za-z0-9._:-]`.
pub fn validate_identifier(field: &str, value: &str) -> Result<String, ShareError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ShareError::Validation(format!("{field} is required")));
    }
    if trimmed.len() > MAX_IDENTIFIER_LEN {
        return Err(ShareError::Validation(format!(
            "{field} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return Err(ShareError::Validation(format!(
            "{field} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}
