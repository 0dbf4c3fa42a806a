use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use idpot::api::{start_server, AppState, ServerConfig};
use idpot::registry::DEFAULT_LOCK_TIMEOUT;
use idpot::storage::RocksDbStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("idpot=info".parse()?))
        .init();

    tracing::info!("idpot starting...");

    let data_dir = std::env::var("IDPOT_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let store = Arc::new(RocksDbStore::open(&data_dir)?);
    tracing::info!("Opened counter store at {}", data_dir);

    let lock_timeout = std::env::var("IDPOT_LOCK_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_LOCK_TIMEOUT);

    let state = Arc::new(AppState::new(store, lock_timeout));

    let config = ServerConfig {
        host: std::env::var("IDPOT_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        port: std::env::var("IDPOT_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080),
    };

    start_server(config, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;

    Ok(())
}
