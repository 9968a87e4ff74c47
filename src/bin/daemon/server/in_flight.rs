//! In-flight Request Tracking
//!
//! [`InFlight`] is the dispatcher's bookkeeping of requests that were accepted but
//! not yet answered. It is owned by the dispatcher loop and only mutated there.
//! Each spawned request unit holds a [`ReplyGuard`]; the guard guarantees that one
//! [`Reply`] reaches the dispatcher on every exit path, so every id inserted into
//! the set is eventually removed.

use std::collections::HashSet;

use async_std::channel::Sender;
use bytes::Bytes;
use tracing::warn;

use super::response_handler;

/// Identifier assigned to each accepted request
pub type RequestId = u64;

/// A response ready to be written back to the client identified by `tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: RequestId,
    pub tag: Bytes,
    pub payload: String,
}

/// Requests accepted but not yet answered
#[derive(Debug, Default)]
pub struct InFlight {
    active: HashSet<RequestId>,
    next_id: RequestId,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted request and return its id
    pub fn begin(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.active.insert(id);
        id
    }

    /// Mark a request as answered; returns false for unknown ids
    pub fn finish(&mut self, id: RequestId) -> bool {
        self.active.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Completion hook owned by a request unit
///
/// Call [`ReplyGuard::send`] with the response. If the guard is dropped without
/// that (the unit was cancelled or unwound), it sends the generic internal error
/// instead.
#[derive(Debug)]
pub struct ReplyGuard {
    id: RequestId,
    tag: Bytes,
    replies: Option<Sender<Reply>>,
}

impl ReplyGuard {
    pub fn new(id: RequestId, tag: Bytes, replies: Sender<Reply>) -> Self {
        Self {
            id,
            tag,
            replies: Some(replies),
        }
    }

    /// Hand the response payload to the dispatcher
    pub fn send(mut self, payload: String) {
        self.deliver(payload);
    }

    fn deliver(&mut self, payload: String) {
        let Some(replies) = self.replies.take() else {
            return;
        };
        let reply = Reply {
            id: self.id,
            tag: self.tag.clone(),
            payload,
        };
        // Unbounded channel: only fails once the dispatcher is gone
        if replies.try_send(reply).is_err() {
            warn!("Dispatcher gone, dropping reply for request {}", self.id);
        }
    }
}

impl Drop for ReplyGuard {
    fn drop(&mut self) {
        if self.replies.is_some() {
            warn!("Request {} ended without a reply, answering with internal error", self.id);
            self.deliver(response_handler::internal_error_payload());
        }
    }
}
