use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Attributes published by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Position,
    Velocity,
    DialPosition,
    OnTarget,
    ServoOn,
    PosError,
    PosTolerance,
    Acceleration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Double,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Double(f64),
}

impl AttributeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            AttributeValue::Bool(_) => ValueKind::Boolean,
            AttributeValue::Double(_) => ValueKind::Double,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Double(v) => Some(*v),
            AttributeValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            AttributeValue::Double(_) => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::Position,
        Attribute::Velocity,
        Attribute::DialPosition,
        Attribute::OnTarget,
        Attribute::ServoOn,
        Attribute::PosError,
        Attribute::PosTolerance,
        Attribute::Acceleration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Position => "Position",
            Attribute::Velocity => "Velocity",
            Attribute::DialPosition => "DialPosition",
            Attribute::OnTarget => "OnTarget",
            Attribute::ServoOn => "ServoOn",
            Attribute::PosError => "PosError",
            Attribute::PosTolerance => "PosTolerance",
            Attribute::Acceleration => "Acceleration",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Attribute::OnTarget | Attribute::ServoOn => ValueKind::Boolean,
            _ => ValueKind::Double,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Attribute::OnTarget | Attribute::PosError)
    }

    /// Last written value is re-applied to the hardware on init.
    pub fn is_memorized(&self) -> bool {
        matches!(self, Attribute::ServoOn | Attribute::PosTolerance)
    }

    pub fn is_expert(&self) -> bool {
        matches!(self, Attribute::DialPosition)
    }

    /// Reject writes that must never reach the controller.
    pub fn check_write(&self, value: &AttributeValue) -> anyhow::Result<()> {
        if !self.is_writable() {
            bail!("Attribute {} is read-only", self);
        }
        if value.kind() != self.kind() {
            bail!(
                "Attribute {} expects a {:?} value, got {:?}",
                self,
                self.kind(),
                value.kind()
            );
        }
        if let AttributeValue::Double(v) = value {
            if !v.is_finite() {
                bail!("Attribute {} cannot be set to {}", self, v);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
