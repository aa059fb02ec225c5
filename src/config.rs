use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    axis::config::DeviceConfig, device_manager::config::ManagerConfig,
    socket_server::config::SocketServerConfig,
};

/// Everything the server needs at startup, usually read from a JSON file.
///
/// ```json
/// {
///   "device": { "ctrl_host": "172.16.205.6", "axis_name": "1", "offset": 50.0, "sign": 1 },
///   "server": { "listen_addr": "0.0.0.0:7754" },
///   "manager": { "read_cache_ttl_ms": 100 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub server: SocketServerConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
}

impl AppConfig {
    pub fn new(axis_name: impl Into<String>) -> Self {
        Self {
            device: DeviceConfig::new(axis_name),
            server: SocketServerConfig::default(),
            manager: ManagerConfig::default(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        if self.server.max_connections == 0 {
            anyhow::bail!("server.max_connections must be positive");
        }
        Ok(())
    }
}
