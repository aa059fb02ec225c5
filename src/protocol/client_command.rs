use crate::axis::{
    attribute::{Attribute, AttributeValue},
    movement_parameters::MovementParams,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "read_attribute")]
    ReadAttribute {
        attribute: Attribute,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "write_attribute")]
    WriteAttribute {
        attribute: Attribute,
        value: AttributeValue,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "move")]
    Move {
        target: f64,
        #[serde(default)]
        params: Option<MovementParams>,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "stop")]
    Stop {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "get_state")]
    GetState {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "get_idn")]
    GetIdn {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "get_error")]
    GetError {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "ackn_error")]
    AcknError {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "init")]
    Init {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "list_attributes")]
    ListAttributes {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        id: Option<String>,
    },
}

impl ClientCommand {
    /// Every value accepted in the `type` tag.
    pub const TYPES: &'static [&'static str] = &[
        "read_attribute",
        "write_attribute",
        "move",
        "stop",
        "get_state",
        "get_idn",
        "get_error",
        "ackn_error",
        "init",
        "list_attributes",
        "ping",
    ];

    pub fn id(&self) -> Option<&String> {
        match self {
            ClientCommand::ReadAttribute { id, .. } => id.as_ref(),
            ClientCommand::WriteAttribute { id, .. } => id.as_ref(),
            ClientCommand::Move { id, .. } => id.as_ref(),
            ClientCommand::Stop { id } => id.as_ref(),
            ClientCommand::GetState { id } => id.as_ref(),
            ClientCommand::GetIdn { id } => id.as_ref(),
            ClientCommand::GetError { id } => id.as_ref(),
            ClientCommand::AcknError { id } => id.as_ref(),
            ClientCommand::Init { id } => id.as_ref(),
            ClientCommand::ListAttributes { id } => id.as_ref(),
            ClientCommand::Ping { id } => id.as_ref(),
        }
    }
}
