pub mod api; // HTTP surface: issue, revoke, resolve
pub mod config;
pub mod db;
pub mod models;
pub mod sharing; // Token store, revocation, issuer, access gate

#[cfg(test)]
mod log_audit;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Startup failures surfaced to the binary.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Storage error: {0}")]
    Storage(#[from] sharing::StoreError),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Signal handling error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Run the share service until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::ShareConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let retention = config.audit_retention;
    let share = Arc::new(sharing::ShareService::from_config(config)?);

    // Housekeeping only; a failure here must not block startup
    if let Err(e) = share.revocation.compact(retention) {
        tracing::warn!("Startup compaction failed: {e}");
    }

    let mut server = api::start_share_api_server_on(share, bind_addr)
        .await
        .map_err(StartupError::Server)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    server.shutdown();
    server.stopped().await;
    Ok(())
}
