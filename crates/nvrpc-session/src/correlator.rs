//! Request id allocation and reply routing.
//!
//! ```text
//!   request() ──► register(method) ──► id ──► wire
//!                     │
//!                     ▼
//!   pending: HashMap<id, PendingRequest { reply: oneshot::Sender }>
//!                     ▲
//!   wire ──► response(id) ──► take(id) ──► finish(result)
//!
//!   detach ──► flush: every entry gets Disconnected, exactly once
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use nvrpc_codec::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};

/// Direction request ids move in for the life of one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdDirection {
    /// 1, 2, 3, ... (native msgpack-RPC)
    Ascending,
    /// -1, -2, -3, ... (line-JSON, where positive ids belong to the host)
    Descending,
}

impl IdDirection {
    fn first(self) -> i64 {
        match self {
            IdDirection::Ascending => 1,
            IdDirection::Descending => -1,
        }
    }

    fn advance(self, id: i64) -> i64 {
        let next = match self {
            IdDirection::Ascending => id.wrapping_add(1),
            IdDirection::Descending => id.wrapping_sub(1),
        };
        // Stay on our side of zero.
        match (self, next) {
            (IdDirection::Ascending, n) if n <= 0 => 1,
            (IdDirection::Descending, n) if n >= 0 => -1,
            (_, n) => n,
        }
    }
}

/// One in-flight request.
#[derive(Debug)]
pub struct PendingRequest {
    method: String,
    issued_at: Instant,
    reply: oneshot::Sender<Result<Value>>,
}

impl PendingRequest {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed()
    }

    /// Deliver the outcome. A caller that stopped waiting is ignored.
    pub fn finish(self, result: Result<Value>) {
        let _ = self.reply.send(result);
    }
}

#[derive(Debug)]
struct State {
    next_id: i64,
    attached: bool,
    pending: HashMap<i64, PendingRequest>,
}

/// Pending-request table for one transport instance.
#[derive(Debug)]
pub struct Correlator {
    direction: IdDirection,
    slow_threshold: Duration,
    state: Mutex<State>,
}

impl Correlator {
    pub fn new(direction: IdDirection, slow_threshold: Duration) -> Self {
        Self {
            direction,
            slow_threshold,
            state: Mutex::new(State {
                next_id: direction.first(),
                attached: true,
                pending: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id and park a waiter for it.
    ///
    /// Fails with [`RpcError::Disconnected`] once the transport detached.
    pub fn register(&self, method: &str) -> Result<(i64, oneshot::Receiver<Result<Value>>)> {
        let mut state = self.lock();
        if !state.attached {
            return Err(RpcError::Disconnected);
        }
        let mut id = state.next_id;
        while state.pending.contains_key(&id) {
            id = self.direction.advance(id);
        }
        state.next_id = self.direction.advance(id);

        let (tx, rx) = oneshot::channel();
        state.pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                issued_at: Instant::now(),
                reply: tx,
            },
        );
        debug!(id, method, pending = state.pending.len(), "registered request");
        Ok((id, rx))
    }

    /// Remove the entry for `id`, if any, so the caller can post-process
    /// the result before [`PendingRequest::finish`].
    pub fn take(&self, id: i64) -> Option<PendingRequest> {
        let entry = self.lock().pending.remove(&id);
        match &entry {
            Some(entry) => {
                let elapsed = entry.elapsed();
                if elapsed > self.slow_threshold {
                    warn!(id, method = %entry.method, ?elapsed, "slow response");
                }
            }
            None => warn!(id, "response for unknown request id ignored"),
        }
        entry
    }

    /// Route a reply to its waiter. Unknown ids are a logged no-op.
    pub fn complete(&self, id: i64, result: Result<Value>) -> bool {
        match self.take(id) {
            Some(entry) => {
                entry.finish(result);
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `id` without replying (deadline expiry).
    pub fn cancel(&self, id: i64) -> bool {
        self.lock().pending.remove(&id).is_some()
    }

    /// Mark detached and fail every pending request with
    /// [`RpcError::Disconnected`].
    ///
    /// Returns the number flushed, or `None` if already detached.
    pub fn detach(&self) -> Option<usize> {
        let drained: Vec<(i64, PendingRequest)> = {
            let mut state = self.lock();
            if !state.attached {
                return None;
            }
            state.attached = false;
            state.pending.drain().collect()
        };
        let count = drained.len();
        for (id, entry) in drained {
            debug!(id, method = %entry.method, "flushing pending request");
            entry.finish(Err(RpcError::Disconnected));
        }
        Some(count)
    }

    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}

/// Caller-side handle on one in-flight request.
#[derive(Debug)]
pub struct PendingReply {
    id: i64,
    method: String,
    rx: oneshot::Receiver<Result<Value>>,
    correlator: Arc<Correlator>,
    timeout: Option<Duration>,
}

impl PendingReply {
    pub(crate) fn new(
        id: i64,
        method: &str,
        rx: oneshot::Receiver<Result<Value>>,
        correlator: Arc<Correlator>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            method: method.to_string(),
            rx,
            correlator,
            timeout,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Wait for the reply.
    ///
    /// On deadline expiry the pending entry is removed, so a late response
    /// is ignored.
    pub async fn recv(self) -> Result<Value> {
        let outcome = match self.timeout {
            Some(after) => match tokio::time::timeout(after, self.rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.correlator.cancel(self.id);
                    warn!(id = self.id, method = %self.method, ?after, "request timed out");
                    return Err(RpcError::Timeout {
                        method: self.method,
                        after,
                    });
                }
            },
            None => self.rx.await,
        };
        outcome.unwrap_or(Err(RpcError::Disconnected))
    }
}
