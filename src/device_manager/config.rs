use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// How long a read attribute value is served from cache. 0 disables caching.
    pub read_cache_ttl_ms: u64,
    pub cache_capacity: u64,
    pub queue_depth: usize,
}

impl ManagerConfig {
    pub fn read_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.read_cache_ttl_ms)
    }

    pub fn caching_enabled(&self) -> bool {
        self.read_cache_ttl_ms > 0 && self.cache_capacity > 0
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            read_cache_ttl_ms: 100,
            cache_capacity: 64,
            queue_depth: 100,
        }
    }
}
