use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub limits: LimitsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub listen_addr: String,
    pub listen_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsSettings {
    /// Maximum concurrent connections
    #[serde(default = "default_max_conns")]
    pub max_conns: usize,
    /// Maximum frame size in bytes
    #[serde(default = "default_max_frame")]
    pub max_frame_bytes: u32,
    /// Keep-alive interval in seconds
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
    /// How many changes the store retains for replay
    #[serde(default = "default_history")]
    pub history_limit: usize,
    /// Interval between simulated resource changes, in milliseconds
    #[serde(default = "default_change_interval")]
    pub change_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Output logs as JSON
    #[serde(default)]
    pub json_logs: bool,
}

fn default_max_conns() -> usize {
    100
}

fn default_max_frame() -> u32 {
    watchkit_proto::DEFAULT_MAX_FRAME_SIZE
}

fn default_heartbeat() -> u64 {
    15
}

fn default_history() -> usize {
    256
}

fn default_change_interval() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            server: ServerSettings {
                listen_addr: "127.0.0.1".to_string(),
                listen_port: 5000,
            },
            limits: LimitsSettings {
                max_conns: default_max_conns(),
                max_frame_bytes: default_max_frame(),
                heartbeat_secs: default_heartbeat(),
                history_limit: default_history(),
                change_interval_ms: default_change_interval(),
            },
            logging: LoggingSettings {
                log_level: default_log_level(),
                json_logs: false,
            },
        }
    }
}
