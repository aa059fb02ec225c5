use crate::axis::{
    attribute::{Attribute, AttributeValue},
    movement_parameters::MovementParams,
};
use anyhow::Result;
use serde_json::Value;
use tokio::sync::oneshot;

pub type Reply = oneshot::Sender<Result<Value>>;

#[derive(Debug)]
pub enum Command {
    ReadAttr {
        attr: Attribute,
        resp: Reply,
    },
    WriteAttr {
        attr: Attribute,
        value: AttributeValue,
        resp: Reply,
    },
    Move {
        target: f64,
        params: Option<MovementParams>,
        resp: Reply,
    },
    Stop {
        resp: Reply,
    },
    GetState {
        resp: Reply,
    },
    GetIdn {
        resp: Reply,
    },
    GetError {
        resp: Reply,
    },
    AcknError {
        resp: Reply,
    },
    Init {
        resp: Reply,
    },
    ListAttributes {
        resp: Reply,
    },
    Shutdown {
        resp: Reply,
    },
}
