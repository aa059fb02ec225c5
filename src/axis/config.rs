use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::frame::{CoordinateFrame, Sign};
use crate::gcs::DEFAULT_PORT;

/// Per-device properties: where the controller lives and how its axis maps
/// into the user frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_ctrl_host")]
    pub ctrl_host: String,
    #[serde(default = "default_ctrl_port")]
    pub ctrl_port: u16,
    pub axis_name: String,
    #[serde(default = "default_offset")]
    pub offset: f64,
    #[serde(default = "default_sign")]
    pub sign: Sign,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Memorized servo state applied on init.
    #[serde(default)]
    pub servo_on: Option<bool>,
    /// Memorized on-target tolerance applied on init.
    #[serde(default)]
    pub pos_tolerance: Option<f64>,
}

fn default_ctrl_host() -> String {
    "172.16.205.6".to_string()
}

fn default_ctrl_port() -> u16 {
    DEFAULT_PORT
}

fn default_offset() -> f64 {
    50.0
}

fn default_sign() -> Sign {
    Sign::Positive
}

fn default_timeout_ms() -> u64 {
    7000
}

impl DeviceConfig {
    pub fn new(axis_name: impl Into<String>) -> Self {
        Self {
            ctrl_host: default_ctrl_host(),
            ctrl_port: default_ctrl_port(),
            axis_name: axis_name.into(),
            offset: default_offset(),
            sign: default_sign(),
            timeout_ms: default_timeout_ms(),
            servo_on: None,
            pos_tolerance: None,
        }
    }

    pub fn frame(&self) -> CoordinateFrame {
        CoordinateFrame::new(self.offset, self.sign)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.axis_name.trim().is_empty() {
            anyhow::bail!("device.axis_name must not be empty");
        }
        if self.ctrl_host.trim().is_empty() {
            anyhow::bail!("device.ctrl_host must not be empty");
        }
        if !self.offset.is_finite() {
            anyhow::bail!("device.offset must be a finite number");
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("device.timeout_ms must be positive");
        }
        Ok(())
    }
}
