use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AxisState {
    /// Not attached to a controller yet.
    Init,
    /// Servo disabled.
    Off,
    On,
    Moving,
    Fault,
}

impl std::fmt::Display for AxisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AxisState::Init => "INIT",
            AxisState::Off => "OFF",
            AxisState::On => "ON",
            AxisState::Moving => "MOVING",
            AxisState::Fault => "FAULT",
        };
        f.write_str(name)
    }
}
