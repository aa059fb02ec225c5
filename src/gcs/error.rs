use thiserror::Error;

/// Errors raised while talking GCS to the controller.
#[derive(Error, Debug)]
pub enum GcsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed by controller")]
    ConnectionClosed,

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Non-zero code reported by `ERR?` after a command.
    #[error("Controller error {code}: {message}")]
    ControllerError { code: i32, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl GcsError {
    pub fn controller(code: i32) -> Self {
        GcsError::ControllerError {
            code,
            message: describe(code),
        }
    }

    /// The link itself failed, as opposed to the controller refusing a command.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GcsError::Io(_)
                | GcsError::ConnectionFailed(_)
                | GcsError::ConnectionClosed
                | GcsError::Timeout
                | GcsError::InvalidResponse(_)
        )
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            GcsError::ControllerError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type GcsResult<T> = Result<T, GcsError>;

/// Human-readable text for the PI error codes an E-754 commonly reports.
pub fn describe(code: i32) -> String {
    match code {
        0 => "No error".to_string(),
        1 => "Parameter syntax error".to_string(),
        2 => "Unknown command".to_string(),
        3 => "Command length out of limits".to_string(),
        4 => "Error while scanning".to_string(),
        5 => "Unallowable move attempted on unreferenced axis, or move attempted with servo off"
            .to_string(),
        6 => "Parameter out of range".to_string(),
        7 => "Position out of limits".to_string(),
        8 => "Velocity out of limits".to_string(),
        10 => "Controller was stopped by command".to_string(),
        15 => "Invalid axis identifier".to_string(),
        17 => "Param not found in non-volatile memory".to_string(),
        23 => "Illegal axis".to_string(),
        24 => "Incorrect number of parameters".to_string(),
        25 => "Invalid floating point number".to_string(),
        54 => "Unknown parameter".to_string(),
        _ => format!("Unknown error ({code})"),
    }
}
