#![cfg(feature = "daemon")]

mod config;
mod error;
mod server;
mod utils;

use std::path::PathBuf;

use async_std::channel;
use clap::Parser;
use tracing::info;

use config::{ENV_HOST, ENV_PORT, ServerConfig};
use server::server::DaemonServer;
use utils::signals::{SHUTDOWN_SIGNALS, forward_shutdown_signals};

/// zcmdd - ZeroMQ command server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = ENV_HOST)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long, env = ENV_PORT)]
    port: Option<u16>,

    /// Append logs to this file as well as stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = ServerConfig::load(args.config.as_deref())?.with_overrides(
        args.host,
        args.port,
        args.log_file,
    )?;
    let _log_guard = utils::tracing::setup_tracing(config.log_file.as_deref())?;

    let daemon_server = DaemonServer::bind(&config).await?;

    let (shutdown_tx, shutdown_rx) = channel::bounded(1);
    forward_shutdown_signals(&SHUTDOWN_SIGNALS, shutdown_tx)?;

    daemon_server.run(shutdown_rx).await;
    info!("Daemon stopped");
    Ok(())
}
