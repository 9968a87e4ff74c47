//! Request Validator
//!
//! Shape checks on a decoded request. Validation runs strictly before the command
//! factory, which relies on the shape established here.

use serde_json::{Map, Value};

use crate::error::{CommandError, CommandResult};

/// Check that `request` is a well-formed `os` or `compute` request
///
/// # Arguments
/// * `request` - The decoded JSON payload
///
/// # Returns
/// * `CommandResult<()>` - Ok for a valid shape, `CommandError::Validation` otherwise
pub fn validate(request: &Value) -> CommandResult<()> {
    let Some(request) = request.as_object() else {
        return Err(invalid("Request must be a JSON object"));
    };

    let Some(command_type) = request.get("command_type") else {
        return Err(invalid("Missing 'command_type' in request"));
    };

    match command_type.as_str() {
        Some("os") => validate_os_command(request),
        Some("compute") => validate_compute_command(request),
        Some(other) => Err(invalid(format!("Invalid command_type: {}", other))),
        None => Err(invalid(format!("Invalid command_type: {}", command_type))),
    }
}

fn validate_os_command(request: &Map<String, Value>) -> CommandResult<()> {
    match request.get("command_name") {
        None => return Err(invalid("Missing 'command_name' for OS command")),
        Some(Value::String(_)) => {}
        Some(_) => return Err(invalid("'command_name' must be a string")),
    }

    match request.get("parameters") {
        None => Ok(()),
        Some(Value::Array(parameters)) if parameters.iter().all(Value::is_string) => Ok(()),
        Some(Value::Array(_)) => Err(invalid("'parameters' must be a list of strings")),
        Some(_) => Err(invalid("'parameters' must be a list")),
    }
}

fn validate_compute_command(request: &Map<String, Value>) -> CommandResult<()> {
    match request.get("expression") {
        None => Err(invalid("Missing 'expression' for compute command")),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(invalid("'expression' must be a string")),
    }
}

fn invalid(message: impl Into<String>) -> CommandError {
    CommandError::Validation(message.into())
}
