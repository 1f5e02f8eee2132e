use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub client: ClientSettings,
    pub watch: WatchSettings,
    pub timeouts: TimeoutSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSettings {
    pub server_addr: String,
    pub server_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchSettings {
    /// Collection to watch: pods, configmaps, or deployments
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// First reconnect delay after a broken stream
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            client: ClientSettings {
                server_addr: "127.0.0.1".to_string(),
                server_port: 5000,
            },
            watch: WatchSettings {
                resource: "pods".to_string(),
                namespace: None,
            },
            timeouts: TimeoutSettings {
                connect_timeout_secs: default_connect_timeout(),
                initial_backoff_ms: default_initial_backoff(),
                max_backoff_ms: default_max_backoff(),
            },
        }
    }
}
