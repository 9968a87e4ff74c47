//! Signal Handling Module
//!
//! Forwards termination signals to the dispatcher as a stop request. The first
//! signal starts the drain; later ones are logged and ignored so in-flight
//! requests still get their replies.

use std::os::raw::c_int;

use async_std::channel::Sender;
use async_std::task;
use futures::StreamExt;
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook_async_std::Signals;
use tracing::{info, warn};

use crate::error::{DaemonError, Result};

/// Signals that request a graceful shutdown
pub const SHUTDOWN_SIGNALS: [c_int; 3] = [SIGTERM, SIGINT, SIGQUIT];

/// Install handlers for `signals` and forward the first one to `shutdown_tx`
///
/// # Arguments
/// * `signals` - Signal numbers to listen for
/// * `shutdown_tx` - Sender half of the dispatcher's shutdown channel
///
/// # Returns
/// * `Result<()>` - Ok once the handlers are installed
pub fn forward_shutdown_signals(signals: &[c_int], shutdown_tx: Sender<()>) -> Result<()> {
    let signals = Signals::new(signals).map_err(DaemonError::Signal)?;
    task::spawn(listen(signals, shutdown_tx));
    Ok(())
}

async fn listen(mut signals: Signals, shutdown_tx: Sender<()>) {
    let mut requested = false;
    while let Some(signal) = signals.next().await {
        if requested {
            warn!("Signal {} received while draining, still waiting for in-flight requests", signal);
            continue;
        }
        info!("Signal {} received, requesting shutdown", signal);
        requested = true;
        if shutdown_tx.send(()).await.is_err() {
            info!("Server loop already stopped");
        }
    }
}
