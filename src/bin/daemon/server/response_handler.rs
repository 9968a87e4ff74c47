use serde::Serialize;
use tracing::error;

use crate::error::{CommandError, CommandResult};

/// Body sent back when something unexpected happened; never carries detail
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// JSON response bodies understood by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// `{"given_os_command": ..., "result": ...}`
    OsCommand {
        given_os_command: String,
        result: String,
    },
    /// `{"given_math_expression": ..., "result": ...}`
    MathExpression {
        given_math_expression: String,
        result: String,
    },
    /// `{"error": ..., "command": ...}` for validation and execution failures
    Failure {
        error: String,
        command: Option<String>,
    },
    /// `{"error": ...}` for undecodable payloads and internal faults
    Error { error: String },
}

impl Response {
    pub fn internal_error() -> Self {
        Response::Error {
            error: INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<CommandError> for Response {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::InvalidJson(_) => Response::Error {
                error: err.to_string(),
            },
            CommandError::Validation(message) => Response::Failure {
                error: message,
                command: None,
            },
            CommandError::Execution { message, command } => Response::Failure {
                error: message,
                command: Some(command),
            },
            CommandError::Internal(_) => Response::internal_error(),
        }
    }
}

/// Format a command result into the JSON payload sent to the client
///
/// # Arguments
/// * `result` - The command result to format
///
/// # Returns
/// * `String` - The serialized response; never partially written
pub fn format_response(result: CommandResult<Response>) -> String {
    let response = result.unwrap_or_else(Response::from);
    serde_json::to_string(&response).unwrap_or_else(|err| {
        error!("Failed to serialize response: {}", err);
        internal_error_payload()
    })
}

/// Serialized form of [`Response::internal_error`]
pub fn internal_error_payload() -> String {
    format!("{{\"error\":\"{}\"}}", INTERNAL_ERROR_MESSAGE)
}
