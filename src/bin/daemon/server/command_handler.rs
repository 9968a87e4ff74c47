//! Request Handling Pipeline
//!
//! Turns one raw payload into one serialized response:
//! decode → validate → create command → execute → format. Every failure, including
//! a panic inside the pipeline, is converted into a response here, so the caller
//! always has exactly one payload to send back.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error};

use super::command_factory;
use super::response_handler::{self, Response};
use super::validator;
use crate::error::{CommandError, CommandResult};

/// Handle a raw request payload and return the response payload
///
/// # Arguments
/// * `payload` - The request frame as received from the socket
/// * `max_message_size` - Payloads larger than this are refused
///
/// # Returns
/// * `String` - The JSON response to send back to the client
pub async fn handle_request(payload: &[u8], max_message_size: usize) -> String {
    respond(process_request(payload, max_message_size)).await
}

/// Drive a request pipeline to its response payload
///
/// A panic inside `pipeline` is caught here and answered with the generic
/// internal error; the panic message only goes to the log.
pub async fn respond<F>(pipeline: F) -> String
where
    F: Future<Output = CommandResult<Response>>,
{
    let result = AssertUnwindSafe(pipeline)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(CommandError::Internal(format!(
                "request handler panicked: {}",
                panic_message(panic.as_ref())
            )))
        });

    match &result {
        Err(CommandError::Internal(detail)) => error!("Unexpected error: {}", detail),
        Err(err) => debug!("Request failed: {}", err),
        Ok(_) => {}
    }

    response_handler::format_response(result)
}

async fn process_request(payload: &[u8], max_message_size: usize) -> CommandResult<Response> {
    if payload.len() > max_message_size {
        return Err(CommandError::Validation(format!(
            "Message too large: {} bytes (max: {})",
            payload.len(),
            max_message_size
        )));
    }

    let request: Value = serde_json::from_slice(payload).map_err(CommandError::InvalidJson)?;
    validator::validate(&request)?;

    let command = command_factory::create_command(&request)?;
    command.execute().await
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
