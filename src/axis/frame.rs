use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Direction of the user frame relative to the controller's dial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn factor(self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }
}

impl TryFrom<i16> for Sign {
    type Error = anyhow::Error;

    fn try_from(value: i16) -> anyhow::Result<Self> {
        match value {
            1 => Ok(Sign::Positive),
            -1 => Ok(Sign::Negative),
            other => bail!("sign must be 1 or -1, got {}", other),
        }
    }
}

impl From<Sign> for i16 {
    fn from(sign: Sign) -> Self {
        match sign {
            Sign::Positive => 1,
            Sign::Negative => -1,
        }
    }
}

/// Maps dial positions to user positions: `user = sign * (dial + offset)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateFrame {
    offset: f64,
    sign: Sign,
}

impl CoordinateFrame {
    pub fn new(offset: f64, sign: Sign) -> Self {
        Self { offset, sign }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn to_user(&self, dial: f64) -> f64 {
        self.sign.factor() * (dial + self.offset)
    }

    pub fn to_dial(&self, user: f64) -> f64 {
        self.sign.factor() * user - self.offset
    }

    /// Differences between two positions carry no offset.
    pub fn error_to_user(&self, dial_error: f64) -> f64 {
        self.sign.factor() * dial_error
    }
}

impl Default for CoordinateFrame {
    fn default() -> Self {
        Self::new(0.0, Sign::Positive)
    }
}
