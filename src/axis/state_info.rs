use serde::{Deserialize, Serialize};

use super::state::AxisState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisStateInfo {
    pub state: AxisState,
    pub status: String,
}

impl AxisStateInfo {
    pub fn new(state: AxisState) -> Self {
        let status = match state {
            AxisState::Init => "Device is not initialised",
            AxisState::Off => "Servo is off",
            AxisState::On => "Device is ready",
            AxisState::Moving => "Device is moving",
            AxisState::Fault => "Device is in fault",
        };
        Self {
            state,
            status: status.to_string(),
        }
    }

    /// Derive the state from the servo and on-target flags.
    pub fn from_readings(servo_on: bool, on_target: bool) -> Self {
        match (servo_on, on_target) {
            (false, _) => Self::new(AxisState::Off),
            (true, true) => Self::new(AxisState::On),
            (true, false) => Self::new(AxisState::Moving),
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self::new(AxisState::Fault).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status = message.into();
        self
    }

    pub fn is_moving(&self) -> bool {
        self.state == AxisState::Moving
    }

    pub fn is_faulted(&self) -> bool {
        self.state == AxisState::Fault
    }

    pub fn is_ready(&self) -> bool {
        self.state == AxisState::On
    }
}
