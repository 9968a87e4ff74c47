//! Command Factory
//!
//! Maps a validated request onto a concrete [`Command`]. The mapping is exhaustive
//! over [`Request`]; a payload that slipped past validation is reported as an
//! internal fault instead of being turned into a half-built command.

use serde::Deserialize;
use serde_json::Value;

use super::commands::{Command, ComputeCommand, OsCommand};
use crate::error::{CommandError, CommandResult};

/// Typed view of a validated request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command_type", rename_all = "lowercase")]
pub enum Request {
    Os {
        command_name: String,
        #[serde(default)]
        parameters: Vec<String>,
    },
    Compute {
        expression: String,
    },
}

/// Create the command described by `request`
///
/// # Arguments
/// * `request` - A request that has already passed [`super::validator::validate`]
///
/// # Returns
/// * `CommandResult<Command>` - The command, an execution error for a disallowed
///   program, or an internal error for an unknown command type
pub fn create_command(request: &Value) -> CommandResult<Command> {
    let request = Request::deserialize(request)
        .map_err(|err| CommandError::Internal(format!("Cannot build command from request: {}", err)))?;

    Ok(match request {
        Request::Os {
            command_name,
            parameters,
        } => Command::Os(OsCommand::new(command_name, parameters)?),
        Request::Compute { expression } => Command::Compute(ComputeCommand::new(expression)),
    })
}
