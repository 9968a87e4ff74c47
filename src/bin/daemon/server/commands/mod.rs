//! Commands Module
//!
//! The closed set of commands the daemon can execute. A [`Command`] is built by the
//! command factory from a validated request, executed exactly once and dropped.

pub mod compute;
pub mod expression;
pub mod os;

pub use compute::ComputeCommand;
pub use os::OsCommand;

use crate::error::CommandResult;
use crate::server::response_handler::Response;

/// Executable unit created from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Allow-listed external program
    Os(OsCommand),
    /// Restricted arithmetic expression
    Compute(ComputeCommand),
}

impl Command {
    /// Execute the command and produce the success response
    ///
    /// # Returns
    /// * `CommandResult<Response>` - The response to send, or the error to report
    pub async fn execute(&self) -> CommandResult<Response> {
        match self {
            Command::Os(command) => command.execute().await,
            Command::Compute(command) => command.execute(),
        }
    }
}
