/// Errors that end a codec stream or fail an encode.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A single frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a frame.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// JSON serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An extension value carries a tag no handle kind is registered for.
    #[error("unknown extension type tag {0}")]
    UnknownExtension(i8),

    /// A value was expected to be a remote handle but is not one.
    #[error("value is not a remote handle: {0}")]
    NotAHandle(String),
}

/// Per-message decode failures.
///
/// These are reported for the offending frame only; the stream keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The frame is not shaped like any known message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The top-level type tag is not 0, 1 or 2.
    #[error("unknown message type {0}")]
    UnknownType(i64),

    /// A request whose id is readable but whose body is not. The peer is
    /// waiting on `id` and should get an error response.
    #[error("invalid request {id}: {reason}")]
    InvalidRequest { id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, CodecError>;
