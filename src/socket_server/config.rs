use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketServerConfig {
    pub listen_addr: String,
    pub max_connections: usize,
    pub max_line_length: usize,
}

impl Default for SocketServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7754".to_string(),
            max_connections: 100,
            max_line_length: 8192,
        }
    }
}
