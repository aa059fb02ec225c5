use serde::{Deserialize, Serialize};

/// Optional trajectory settings applied before a move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementParams {
    #[serde(default)]
    pub velocity: Option<f64>,
    #[serde(default)]
    pub acceleration: Option<f64>,
}

impl MovementParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_acceleration(mut self, acceleration: f64) -> Self {
        self.acceleration = Some(acceleration);
        self
    }

    pub fn supported() -> Vec<String> {
        vec!["velocity".to_string(), "acceleration".to_string()]
    }
}
