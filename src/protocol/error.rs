#[derive(Debug)]
pub enum ProtocolError {
    /// Not JSON, or a known command with missing or mistyped fields.
    InvalidJson(String),
    /// A JSON value without a string `type` tag.
    MissingType,
    /// `type` names no command this server knows.
    UnknownCommand(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::InvalidJson(msg) => write!(f, "Invalid JSON: {}", msg),
            ProtocolError::MissingType => f.write_str("Missing \"type\" field"),
            ProtocolError::UnknownCommand(kind) => write!(f, "Unknown command type: {}", kind),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::InvalidJson(err.to_string())
    }
}
