use async_std::channel::{self, Receiver, Sender};
use async_std::task;
use bytes::Bytes;
use futures::{FutureExt, pin_mut, select};
use tracing::{debug, error, info};
use zeromq::prelude::*;
use zeromq::{RouterSocket, ZmqMessage, ZmqResult};

use super::command_handler;
use super::in_flight::{InFlight, Reply, ReplyGuard};
use crate::config::ServerConfig;
use crate::error::{DaemonError, Result};

/// Frames in a request: client tag followed by the JSON payload
const REQUEST_FRAMES: usize = 2;

/// Lifecycle of the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Running,
    Draining,
}

/// What woke the dispatcher loop up
enum Event {
    Request(ZmqResult<ZmqMessage>),
    Reply(Option<Reply>),
    Stop,
}

/// Main daemon server structure that handles ZeroMQ communication
///
/// The ROUTER socket is owned here and only touched by the dispatcher loop.
/// Request units never write to the socket themselves; they hand their [`Reply`]
/// back over a channel and the loop sends it with the original client tag.
pub struct DaemonServer {
    /// ZeroMQ router socket shared by all clients
    socket: RouterSocket,
    /// Endpoint actually bound (resolves port 0)
    endpoint: String,
    max_message_size: usize,
    in_flight: InFlight,
    replies_tx: Sender<Reply>,
    replies_rx: Receiver<Reply>,
    state: ServerState,
}

impl DaemonServer {
    /// Bind the router socket and move to `Running`
    ///
    /// # Arguments
    /// * `config` - Daemon configuration providing the bind address and limits
    ///
    /// # Returns
    /// * `Result<DaemonServer>` - The bound server, or `DaemonError::Bind` when the
    ///   address is invalid or already in use
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let requested = config.endpoint();
        let mut socket = RouterSocket::new();
        let endpoint = socket
            .bind(&requested)
            .await
            .map_err(|source| DaemonError::Bind {
                endpoint: requested.clone(),
                source,
            })?;

        info!("Daemon running on {}", endpoint);

        let (replies_tx, replies_rx) = channel::unbounded();
        let mut server = DaemonServer {
            socket,
            endpoint: endpoint.to_string(),
            max_message_size: config.max_message_size,
            in_flight: InFlight::new(),
            replies_tx,
            replies_rx,
            state: ServerState::Stopped,
        };
        server.transition(ServerState::Running);
        Ok(server)
    }

    /// Endpoint the socket is bound to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Run the dispatcher loop until a shutdown request, then drain
    ///
    /// Each accepted request is handled by its own task, so a slow command never
    /// delays reception of the next request. After a shutdown request (a message
    /// on `shutdown_rx`, or every sender being dropped) no new frames are read;
    /// the loop keeps sending replies until every in-flight request is answered
    /// and only then closes the socket.
    ///
    /// # Arguments
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub async fn run(mut self, shutdown_rx: Receiver<()>) {
        loop {
            let event = {
                let request = self.socket.recv().fuse();
                let reply = self.replies_rx.recv().fuse();
                let stop = shutdown_rx.recv().fuse();
                pin_mut!(request, reply, stop);

                select! {
                    message = request => Event::Request(message),
                    reply = reply => Event::Reply(reply.ok()),
                    _ = stop => Event::Stop,
                }
            };

            match event {
                Event::Request(Ok(message)) => self.accept(message),
                Event::Request(Err(e)) => error!("Error receiving message: {:?}", e),
                Event::Reply(Some(reply)) => self.deliver(reply).await,
                Event::Reply(None) => {}
                Event::Stop => {
                    info!("Shutdown signal received, stopping server loop");
                    break;
                }
            }
        }

        self.drain().await;
        self.close();
    }

    /// Spawn a request unit for a `[tag, payload]` message
    fn accept(&mut self, message: ZmqMessage) {
        let [tag, payload] = match <[Bytes; REQUEST_FRAMES]>::try_from(message.into_vec()) {
            Ok(frames) => frames,
            Err(frames) => {
                debug!(
                    "Skipping message with {} frames (expected {})",
                    frames.len(),
                    REQUEST_FRAMES
                );
                return;
            }
        };

        let id = self.in_flight.begin();
        info!(
            request_id = id,
            client = %format_tag(&tag),
            bytes = payload.len(),
            in_flight = self.in_flight.len(),
            "Received request"
        );

        let guard = ReplyGuard::new(id, tag, self.replies_tx.clone());
        let max_message_size = self.max_message_size;
        task::spawn(async move {
            let response = command_handler::handle_request(&payload, max_message_size).await;
            guard.send(response);
        });
    }

    /// Send a reply with its client tag and retire the request
    async fn deliver(&mut self, reply: Reply) {
        let Reply { id, tag, payload } = reply;
        let client = format_tag(&tag);

        let mut message = ZmqMessage::from(payload);
        message.push_front(tag);
        if let Err(e) = self.socket.send(message).await {
            error!("Failed to send reply for request {} to {}: {:?}", id, client, e);
        }

        self.in_flight.finish(id);
        debug!(
            request_id = id,
            client = %client,
            in_flight = self.in_flight.len(),
            "Reply sent"
        );
    }

    /// Wait for every accepted request to be answered
    async fn drain(&mut self) {
        self.transition(ServerState::Draining);
        if !self.in_flight.is_empty() {
            info!("Waiting for {} in-flight request(s)", self.in_flight.len());
        }

        while !self.in_flight.is_empty() {
            match self.replies_rx.recv().await {
                Ok(reply) => self.deliver(reply).await,
                Err(_) => break,
            }
        }
    }

    fn close(mut self) {
        self.transition(ServerState::Stopped);
        let DaemonServer { socket, endpoint, .. } = self;
        drop(socket);
        info!("Daemon on {} shut down", endpoint);
    }

    fn transition(&mut self, next: ServerState) {
        debug!("Server state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Render a client tag for logs (hex, identities are arbitrary bytes)
pub fn format_tag(tag: &[u8]) -> String {
    tag.iter().map(|byte| format!("{:02x}", byte)).collect()
}
