/// Configuration for the Taskboard Backend.
/// Reads server.json from ~/.config/taskboard/server.json (or platform
/// equivalent); `TASKBOARD_CONFIG` points at another file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Boards live only as long as the process.
    Memory,
    /// One JSON document per board under `data_dir`.
    #[default]
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub data_dir: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            storage: StorageKind::default(),
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Directory for local board documents.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_root().join("boards"))
    }
}

fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
}

/// Config path: $TASKBOARD_CONFIG, else ~/.config/taskboard/server.json
pub fn default_config_path() -> PathBuf {
    std::env::var_os("TASKBOARD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_root().join("server.json"))
}

/// Load config from path. Returns default if file doesn't exist or is invalid.
pub fn load_config(path: &Path) -> ServerConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Failed to parse config {}: {}", path.display(), e);
            ServerConfig::default()
        }),
        Err(_) => {
            log::info!("No config at {}, using defaults", path.display());
            ServerConfig::default()
        }
    }
}
