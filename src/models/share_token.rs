use chrono::{DateTime, DurationRound, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::TokenStatus;

/// A stored share capability. The raw token never appears here, only its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareToken {
    pub id: Uuid,
    pub patient_id: String,
    pub facility_id: Option<String>,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ShareToken {
    /// Build a fresh, unrevoked record expiring `ttl` after `issued_at`.
    ///
    /// Both instants are cut to whole milliseconds, the precision the
    /// SQLite backend keeps, so the expiry handed back to callers is the
    /// one every backend enforces.
    pub fn new(
        patient_id: String,
        facility_id: Option<String>,
        token_hash: String,
        issued_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            facility_id,
            token_hash,
            issued_at: to_millis(issued_at),
            expires_at: to_millis(issued_at + ttl),
            revoked_at: None,
        }
    }

    /// Derived lifecycle state. Revocation wins over expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.revoked_at.is_some() {
            TokenStatus::Revoked
        } else if self.expires_at <= now {
            TokenStatus::Expired
        } else {
            TokenStatus::Active
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == TokenStatus::Active
    }
}

/// One successful clinician resolve. Client identifiers are stored hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessLogEntry {
    pub share_token_id: Uuid,
    pub accessed_at: DateTime<Utc>,
    pub ip_hash: Option<String>,
    pub user_agent_hash: Option<String>,
}

fn to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(chrono::Duration::milliseconds(1))
        .unwrap_or(at)
}
