//! Server Module
//!
//! This module contains the request pipeline and the dispatcher of the zcmd daemon.
//!
//! The server module is organized into these components:
//! - validator: shape checks on decoded requests
//! - command_factory: maps a validated request to a command
//! - commands: the OS and compute command implementations
//! - command_handler: the decode → validate → execute → format pipeline
//! - response_handler: JSON response bodies
//! - in_flight: bookkeeping of accepted but unanswered requests
//! - server: the ZeroMQ ROUTER dispatcher loop

pub mod command_factory;
pub mod command_handler;
pub mod commands;
pub mod in_flight;
pub mod response_handler;
pub mod server;
pub mod validator;

/// Server tests module - pipeline and dispatcher tests
#[cfg(test)]
mod server_tests;
