//! OS command execution
//!
//! Runs one allow-listed program with its parameters passed positionally (no shell
//! involved) and captures stdout, stderr and the exit status. This is the only
//! place in the daemon that spawns processes.

use std::io;
use std::process::{Command as Process, Output, Stdio};

use tracing::{debug, info, warn};

use crate::error::{CommandError, CommandResult};
use crate::server::response_handler::Response;

/// Programs a client may run
pub const SAFE_COMMANDS: [&str; 5] = ["ls", "dir", "cp", "copy", "sleep"];

/// A validated, not yet executed OS command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsCommand {
    name: String,
    parameters: Vec<String>,
}

impl OsCommand {
    /// Build a command, refusing any program outside [`SAFE_COMMANDS`]
    ///
    /// # Arguments
    /// * `name` - Program name as submitted by the client
    /// * `parameters` - Argument vector, passed to the program unchanged
    ///
    /// # Returns
    /// * `CommandResult<OsCommand>` - The command, or an execution error naming the program
    pub fn new(name: String, parameters: Vec<String>) -> CommandResult<Self> {
        if !SAFE_COMMANDS.contains(&name.as_str()) {
            warn!("Rejected command outside allow-list: {}", name);
            return Err(CommandError::execution(
                format!("Command '{}' not allowed", name),
                name,
            ));
        }
        Ok(Self { name, parameters })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// The command line as submitted: name followed by space-joined parameters
    pub fn command_line(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.parameters.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the program to completion
    ///
    /// The blocking spawn/wait happens on async-std's blocking pool so the calling
    /// task only yields until the child exits.
    pub async fn execute(&self) -> CommandResult<Response> {
        let command_line = self.command_line();
        info!("Executing command: {} with {} args", self.name(), self.parameters().len());

        let name = self.name().to_string();
        let parameters = self.parameters().to_vec();
        let output = async_std::task::spawn_blocking(move || run_process(&name, &parameters)).await;

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CommandError::execution(
                    format!("Command not found: {}", self.name),
                    command_line,
                ));
            }
            Err(err) => {
                return Err(CommandError::Internal(format!(
                    "failed to run '{}': {}",
                    command_line, err
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!("Command '{}' exited with {}", command_line, output.status);
            return Err(CommandError::execution(
                format!("Command failed: {}", stderr),
                command_line,
            ));
        }

        Ok(Response::OsCommand {
            given_os_command: command_line,
            result: stdout,
        })
    }
}

fn run_process(name: &str, parameters: &[String]) -> io::Result<Output> {
    Process::new(name)
        .args(parameters)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
}
