pub mod client_command;
pub mod error;
pub mod server_response;

use client_command::ClientCommand;
use error::ProtocolError;
use server_response::ServerResponse;

use anyhow::Result;

pub fn parse_command(json_str: &str) -> Result<ClientCommand, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(json_str)?;
    let kind = value
        .get("type")
        .and_then(|kind| kind.as_str())
        .ok_or(ProtocolError::MissingType)?;
    if !ClientCommand::TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownCommand(kind.to_string()));
    }

    serde_json::from_value(value).map_err(ProtocolError::from)
}

pub fn serialize_response(response: &ServerResponse) -> Result<String, ProtocolError> {
    serde_json::to_string(response).map_err(ProtocolError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::attribute::{Attribute, AttributeValue};

    #[test]
    fn test_parse_write_attribute_command() {
        let json = r#"{"type": "write_attribute", "attribute": "Position", "value": -12.5, "id": "7"}"#;
        let cmd = parse_command(json).unwrap();

        assert_eq!(cmd.id().map(String::as_str), Some("7"));
        match cmd {
            ClientCommand::WriteAttribute {
                attribute, value, ..
            } => {
                assert_eq!(attribute, Attribute::Position);
                assert_eq!(value, AttributeValue::Double(-12.5));
            }
            _ => panic!("Expected WriteAttribute command"),
        }
    }

    #[test]
    fn test_parse_boolean_write() {
        let json = r#"{"type": "write_attribute", "attribute": "ServoOn", "value": true}"#;
        match parse_command(json).unwrap() {
            ClientCommand::WriteAttribute { value, id, .. } => {
                assert_eq!(value, AttributeValue::Bool(true));
                assert!(id.is_none());
            }
            _ => panic!("Expected WriteAttribute command"),
        }
    }

    #[test]
    fn test_parse_move_with_params() {
        let json = r#"{"type": "move", "target": 10.0, "params": {"velocity": 5.0}}"#;
        match parse_command(json).unwrap() {
            ClientCommand::Move { target, params, .. } => {
                assert_eq!(target, 10.0);
                let params = params.unwrap();
                assert_eq!(params.velocity, Some(5.0));
                assert_eq!(params.acceleration, None);
            }
            _ => panic!("Expected Move command"),
        }
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let json = r#"{"type": "read_attribute", "attribute": "Temperature"}"#;
        assert!(matches!(
            parse_command(json),
            Err(ProtocolError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_named() {
        match parse_command(r#"{"type": "home"}"#) {
            Err(ProtocolError::UnknownCommand(kind)) => assert_eq!(kind, "home"),
            other => panic!("Expected UnknownCommand, got {:?}", other),
        }
        assert!(matches!(
            parse_command(r#"{"attribute": "Position"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            parse_command("[1, 2"),
            Err(ProtocolError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_every_listed_type_parses() {
        for kind in ClientCommand::TYPES {
            let json = match *kind {
                "read_attribute" => r#"{"type": "read_attribute", "attribute": "Velocity"}"#.to_string(),
                "write_attribute" => {
                    r#"{"type": "write_attribute", "attribute": "Velocity", "value": 1.0}"#.to_string()
                }
                "move" => r#"{"type": "move", "target": 0.0}"#.to_string(),
                other => format!(r#"{{"type": "{}"}}"#, other),
            };
            assert!(parse_command(&json).is_ok(), "{} failed to parse", kind);
        }
    }

    #[test]
    fn test_serialize_success_response() {
        let response = ServerResponse::success(
            Some("test-id".to_string()),
            serde_json::json!({"result": "ok"}),
        );

        let json = serialize_response(&response).unwrap();
        assert!(json.contains("success"));
        assert!(json.contains("test-id"));
    }

    #[test]
    fn test_serialize_error_response() {
        let response = ServerResponse::error_with_code(
            None,
            "Something went wrong".to_string(),
            server_response::ErrorCode::CommandFailed,
        );

        let json = serialize_response(&response).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
        assert!(json.contains("COMMAND_FAILED"));
        assert!(!json.contains("\"id\""));
    }
}
