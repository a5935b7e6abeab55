//! Pending-request table
//!
//! Maps a request id to its outstanding call: the original request, the
//! caller's settlement channel, and a cancellable timeout. An entry is
//! removed exactly once — by a matching response (which cancels the timer)
//! or by timer expiry (which makes a late response unmatched).

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::time::delay_queue::{DelayQueue, Key};

use wsrpc_json_rpc::{Request, Response};

use crate::error::CallError;

/// The settlement channel observed by a single caller
pub(crate) type ReplySender = oneshot::Sender<Result<Response, CallError>>;

/// One outstanding call
pub(crate) struct PendingRequest {
    pub request: Request,
    pub reply: ReplySender,
    timeout: Key,
}

/// Mapping from request id to outstanding call, with at-most-one removal
/// per id
pub(crate) struct PendingTable {
    entries: HashMap<i64, PendingRequest>,
    timers: DelayQueue<i64>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            timers: DelayQueue::new(),
        }
    }

    /// Track a sent request and arm its single-shot timeout
    pub fn insert(&mut self, id: i64, request: Request, reply: ReplySender, timeout: Duration) {
        let key = self.timers.insert(id, timeout);
        self.entries.insert(
            id,
            PendingRequest {
                request,
                reply,
                timeout: key,
            },
        );
    }

    /// Settle by matching response: removes the entry and cancels its timer
    pub fn complete(&mut self, id: i64) -> Option<PendingRequest> {
        let entry = self.entries.remove(&id)?;
        self.timers.remove(&entry.timeout);
        Some(entry)
    }

    /// Settle by expiry: the timer has already fired and consumed its key
    pub fn expire(&mut self, id: i64) -> Option<PendingRequest> {
        self.entries.remove(&id)
    }

    /// The next fired timer, or `None` while no timers are armed
    pub async fn next_expired(&mut self) -> Option<i64> {
        std::future::poll_fn(|cx| self.timers.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
