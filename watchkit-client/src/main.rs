mod client;
mod config;

use crate::client::WatchClient;
use crate::config::ClientConfig;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use watchkit_proto::Scheme;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging();

    info!("Watchkit client v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;

    // The scheme decides which types this client can decode
    let scheme = Arc::new(Scheme::all_groups()?);

    let mut client = WatchClient::new(config, scheme);

    tokio::select! {
        _ = client.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "watchkit-client.toml".to_string());

    if std::path::Path::new(&path).exists() {
        let config = ClientConfig::from_file(&path)?;
        Ok(config)
    } else {
        warn!("Config file {} not found, using defaults", path);
        Ok(ClientConfig::default_config())
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
