use std::time::Duration;

use nvrpc_codec::Value;

/// Errors surfaced by an RPC session.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// An inbound frame could not be interpreted. The stream continues.
    #[error("framing error: {0}")]
    Framing(String),

    /// A field could not be decoded, e.g. an unknown extension tag.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The host answered a request with an error.
    #[error("request failed ({kind}): {message}")]
    Request { kind: i64, message: String },

    /// The transport detached before a reply arrived, or was never attached.
    #[error("transport disconnected")]
    Disconnected,

    /// A pause level stayed open longer than allowed.
    #[error("pause level {level} not resumed after {age:?}")]
    StalePause { level: usize, age: Duration },

    /// No reply arrived within the configured request deadline.
    #[error("request {method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// `resume`/`cancel` named a level other than the current top.
    #[error("pause level {requested} is not the current level {current}")]
    PauseMismatch { requested: usize, current: usize },

    /// `resume`/`cancel` called with no pause level open.
    #[error("notifications are not paused")]
    NotPaused,

    /// Wire codec failure.
    #[error("codec error: {0}")]
    Codec(#[from] nvrpc_codec::CodecError),

    /// Byte-stream failure.
    #[error("transport error: {0}")]
    Transport(#[from] nvrpc_transport::TransportError),

    /// An async bridge request was answered with an error.
    #[error("remote error: {0}")]
    Remote(String),
}

impl RpcError {
    /// Build a request error from the host's error value.
    ///
    /// Native hosts send `[kind, message]`; anything else is stringified.
    pub fn from_remote(error: &Value) -> Self {
        match error {
            Value::Array(parts) => {
                let kind = parts.first().and_then(Value::as_i64).unwrap_or(0);
                let message = parts.get(1).map(value_text).unwrap_or_default();
                RpcError::Request { kind, message }
            }
            other => RpcError::Request {
                kind: 0,
                message: value_text(other),
            },
        }
    }

    /// Whether the error means the transport is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, RpcError::Disconnected)
    }
}

/// Render a value as plain text, without quoting strings.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        Value::Binary(b) => String::from_utf8_lossy(b).into_owned(),
        other => other.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
