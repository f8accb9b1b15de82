//! Shared types for the share API layer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sharing::ShareService;

/// Resolve attempts allowed per client address.
const RESOLVE_PER_MINUTE: u32 = 30;
const RESOLVE_PER_HOUR: u32 = 300;

/// Tracked client keys before idle windows are swept.
const RATE_SWEEP_THRESHOLD: usize = 4096;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the share router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub share: Arc<ShareService>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(share: Arc<ShareService>) -> Self {
        Self {
            share,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(Mutex::new(limiter));
        self
    }
}

// ═══════════════════════════════════════════════════════════
// Patient context: injected by session middleware
// ═══════════════════════════════════════════════════════════

/// Verified patient identity, injected into request extensions by the
/// session middleware from the upstream `X-Patient-Id` header.
#[derive(Debug, Clone)]
pub struct PatientContext {
    pub patient_id: String,
}

// ═══════════════════════════════════════════════════════════
// Request / response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub patient_id: String,
    #[serde(default)]
    pub facility_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub share_url: String,
    pub qr_svg: String,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: usize,
}

// ═══════════════════════════════════════════════════════════
// Client address
// ═══════════════════════════════════════════════════════════

/// Best-known client address: first `X-Forwarded-For` hop when a proxy
/// set one, else the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter with per-minute and per-hour limits.
/// Keys are hashed client addresses.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(RESOLVE_PER_MINUTE, RESOLVE_PER_HOUR)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        if self.windows.len() > RATE_SWEEP_THRESHOLD {
            self.sweep(now);
        }

        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    fn sweep(&mut self, now: Instant) {
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));
            !entries.is_empty()
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
