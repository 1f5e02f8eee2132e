mod config;
mod handler;
mod sim;
mod store;

use crate::config::ServerConfig;
use crate::handler::ConnectionHandler;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use watchkit_proto::Scheme;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = load_config()?;

    // Initialize logging
    init_logging(&config);

    info!("Watchkit server v{} starting...", env!("CARGO_PKG_VERSION"));

    // Build the type scheme once; every connection shares it read-only
    let scheme = Arc::new(Scheme::all_groups()?);
    info!("Scheme registered with {} types", scheme.len());

    // Create the store and start the demo change producer
    let store = Arc::new(Store::new(config.limits.history_limit));
    tokio::spawn(sim::run(
        store.clone(),
        Duration::from_millis(config.limits.change_interval_ms),
    ));

    // Create connection handler
    let handler = Arc::new(ConnectionHandler::new(
        store,
        scheme,
        config.limits.max_frame_bytes,
        config.limits.heartbeat_secs,
    ));

    // Create connection limit semaphore
    let connection_semaphore = Arc::new(Semaphore::new(config.limits.max_conns));

    // Bind to listen address
    let listen_addr = format!("{}:{}", config.server.listen_addr, config.server.listen_port);
    let listener = TcpListener::bind(&listen_addr).await?;

    info!("Listening on {}", listen_addr);
    info!("Maximum concurrent connections: {}", config.limits.max_conns);

    // Accept connections
    loop {
        // Acquire connection slot
        let permit = connection_semaphore.clone().acquire_owned().await?;

        // Accept connection
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            handler.handle(stream, remote_addr.to_string()).await;
            drop(permit);
        });
    }
}

fn load_config() -> anyhow::Result<ServerConfig> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "watchkit-server.toml".to_string());

    if std::path::Path::new(&path).exists() {
        let config = ServerConfig::from_file(&path)?;
        Ok(config)
    } else {
        warn!("Config file {} not found, using defaults", path);
        Ok(ServerConfig::default_config())
    }
}

fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level));

    if config.logging.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
