#![cfg(feature = "cli")]

use std::time::Duration;

use async_std::future::timeout;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use zeromq::DealerSocket;
use zeromq::ZmqMessage;
use zeromq::prelude::*; // traits

/// Global CLI arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "zcmd - client for the zcmdd command server")]
struct Cli {
    /// Server host
    #[arg(long, env = "ZMQ_SERVER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, env = "ZMQ_SERVER_PORT", default_value_t = 5555)]
    port: u16,

    /// How long to wait for the reply, in milliseconds
    #[arg(short, long, default_value_t = 5000)]
    timeout: u64,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// List of available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an allow-listed OS command on the server
    Os {
        /// Command name (ls, dir, cp, copy, sleep)
        name: String,
        /// Arguments passed to the command as-is
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        parameters: Vec<String>,
    },
    /// Evaluate an arithmetic expression on the server
    Compute {
        /// Expression using numbers, parentheses and + - * / ^
        expression: String,
    },
}

/// Entry point
#[async_std::main]
async fn main() {
    let cli = Cli::parse();

    // Execute the command
    if let Err(e) = handle_command(&cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Build the request JSON for a subcommand
fn build_request(command: &Commands) -> Value {
    match command {
        Commands::Os { name, parameters } => json!({
            "command_type": "os",
            "command_name": name,
            "parameters": parameters,
        }),
        Commands::Compute { expression } => json!({
            "command_type": "compute",
            "expression": expression,
        }),
    }
}

/// Send the request to the server and print its reply
async fn handle_command(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = format!("tcp://{}:{}", cli.host, cli.port);
    let wait = Duration::from_millis(cli.timeout);
    let request = build_request(&cli.command);

    // Connect to the server via ZeroMQ
    let mut socket = DealerSocket::new();
    timeout(wait, socket.connect(&endpoint))
        .await
        .map_err(|_| format!("Timed out connecting to {endpoint}"))??;

    timeout(wait, socket.send(ZmqMessage::from(request.to_string())))
        .await
        .map_err(|_| format!("Timed out sending request to {endpoint}"))??;

    let reply = timeout(wait, socket.recv())
        .await
        .map_err(|_| format!("No reply from {endpoint} within {} ms", cli.timeout))??;

    // Get the first frame as a UTF-8 string
    let reply_str = match reply.get(0) {
        Some(frame) => String::from_utf8(frame.to_vec())?,
        None => String::new(),
    };

    match serde_json::from_str::<Value>(&reply_str) {
        Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
        Err(_) => println!("{}", reply_str), // prints the raw string
    }

    Ok(())
}
