//! Wire codecs for editor RPC.
//!
//! Two wire formats are supported:
//! - msgpack-RPC: `[0, id, method, args]`, `[1, id, error, result]`,
//!   `[2, method, args]`, with buffer/window/tabpage handles carried as
//!   msgpack extension types
//! - line-JSON: one `[id, payload]` array per line, for hosts without native
//!   msgpack-RPC
//!
//! Both codecs plug into `tokio_util::codec::{FramedRead, FramedWrite}` and
//! reassemble partial reads internally; callers always get whole messages.

pub mod batch;
pub mod error;
pub mod handle;
pub mod linejson;
pub mod message;
pub mod msgpack;
pub mod value;

pub use batch::{call_list, AtomicError, AtomicResult, CALL_ATOMIC};
pub use error::{CodecError, MessageError, Result};
pub use handle::{decode_handle, ExtTypes, HandleContext, HandleKind, RemoteHandle};
pub use linejson::{ChannelKind, ChannelMessage, LineJsonCodec};
pub use message::Message;
pub use msgpack::{decode_message, encode_message, Decoded, MsgpackCodec, DEFAULT_MAX_FRAME};
pub use rmpv::Value;
pub use value::{json_to_value, value_to_json};
