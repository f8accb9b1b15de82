use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Medshare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lifetime of a share token, from issuance to expiry (10 minutes).
pub const SHARE_TOKEN_TTL_SECS: u64 = 600;

/// Tokens remembered per patient by the in-process store.
pub const TOKEN_HISTORY_CAP: usize = 20;

/// Records returned to a clinician per resolve, newest first.
pub const RECORD_VIEW_LIMIT: usize = 20;

/// Anything shorter is rejected before a storage lookup.
pub const MIN_RAW_TOKEN_LEN: usize = 10;

/// Longest accepted patient or facility identifier.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Revoked/expired tokens and their access log are kept this long.
pub const AUDIT_RETENTION_DAYS: u64 = 90;

/// Default base URL embedded in QR codes.
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:8787";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medshare_lib=info,medshare=info,tower_http=warn"
}

/// Runtime configuration for the share service.
///
/// `database_path: None` selects the in-process token store, which is only
/// correct for a single-instance deployment.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub database_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub public_base_url: String,
    pub token_ttl: Duration,
    pub history_cap: usize,
    pub record_view_limit: usize,
    pub min_token_len: usize,
    pub audit_retention: Duration,
    /// Report expired tokens as not found instead of gone.
    pub collapse_expired: bool,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            public_base_url: DEFAULT_PUBLIC_URL.into(),
            token_ttl: Duration::from_secs(SHARE_TOKEN_TTL_SECS),
            history_cap: TOKEN_HISTORY_CAP,
            record_view_limit: RECORD_VIEW_LIMIT,
            min_token_len: MIN_RAW_TOKEN_LEN,
            audit_retention: Duration::from_secs(AUDIT_RETENTION_DAYS * 24 * 60 * 60),
            collapse_expired: false,
        }
    }
}

/// Errors from reading configuration out of the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

impl ShareConfig {
    /// Build a config from `MEDSHARE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("MEDSHARE_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(bind) = lookup("MEDSHARE_BIND") {
            config.bind_addr = bind.parse().map_err(|_| ConfigError::InvalidValue {
                var: "MEDSHARE_BIND",
                value: bind.clone(),
            })?;
        }

        if let Some(url) = lookup("MEDSHARE_PUBLIC_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(flag) = lookup("MEDSHARE_COLLAPSE_EXPIRED") {
            config.collapse_expired = match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "MEDSHARE_COLLAPSE_EXPIRED",
                        value: flag,
                    })
                }
            };
        }

        Ok(config)
    }

    /// TTL as a chrono duration, for timestamp arithmetic.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.token_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(SHARE_TOKEN_TTL_SECS as i64))
    }

    /// Whether this config selects the durable SQLite backend.
    pub fn is_durable(&self) -> bool {
        self.database_path.is_some()
    }
}
