use std::fmt;

use nvrpc_codec::Value;

use crate::batcher::QueuedCall;
use crate::config::ProtocolMode;
use crate::correlator::{PendingReply, PendingRequest};
use crate::error::{Result, RpcError};
use crate::responder::Responder;

/// What a transport reports upward, in wire arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// The host called us and waits for a reply.
    Request {
        method: String,
        args: Vec<Value>,
        responder: Responder,
    },
    /// The host sent a notification.
    Notification { method: String, args: Vec<Value> },
    /// The host answered one of our requests. Completed by the consumer so
    /// the caller wakes after every earlier event was handled.
    Response {
        reply: PendingRequest,
        result: Result<Value>,
    },
    /// A frame was dropped; the stream continues.
    Error(RpcError),
    /// The stream is gone. Sent once, last.
    Detached,
}

/// The four primitives both wire protocols implement.
///
/// Implementations own their read/write tasks; every method is
/// non-blocking and safe to call from any task.
pub trait Transport: Send + Sync + fmt::Debug {
    fn mode(&self) -> ProtocolMode;

    /// Write a request and return a handle on its reply.
    ///
    /// Fails immediately with [`RpcError::Disconnected`] when detached.
    fn request(&self, method: &str, args: Vec<Value>) -> Result<PendingReply>;

    /// Write a notification. Dropped (and logged) when detached.
    fn notify(&self, method: &str, args: Vec<Value>);

    /// Stop reading and writing, and fail all pending requests.
    fn detach(&self);

    fn is_attached(&self) -> bool;

    /// The most recent notification written to the host.
    fn last_notification(&self) -> Option<QueuedCall>;
}
