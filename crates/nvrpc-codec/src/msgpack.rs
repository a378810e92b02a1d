use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CodecError, MessageError, Result};
use crate::message::Message;

/// Default maximum frame size: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Outcome of decoding one complete msgpack value.
///
/// `Err` is a per-message problem (unknown type tag, wrong shape); the
/// stream stays usable afterwards.
pub type Decoded = std::result::Result<Message, MessageError>;

/// Encode a message as a single msgpack array.
pub fn encode_message(msg: &Message, dst: &mut BytesMut, max_frame: usize) -> Result<()> {
    let mut buf = Vec::with_capacity(64);
    rmpv::encode::write_value(&mut buf, &msg.to_value())
        .map_err(|err| CodecError::Encode(err.to_string()))?;
    if buf.len() > max_frame {
        return Err(CodecError::FrameTooLarge {
            size: buf.len(),
            max: max_frame,
        });
    }
    dst.extend_from_slice(&buf);
    Ok(())
}

/// Decode one message from the front of `src`.
///
/// Returns `Ok(None)` while the buffer holds only part of a value.
/// On success, consumes exactly the bytes of that value.
pub fn decode_message(src: &mut BytesMut, max_frame: usize) -> Result<Option<Decoded>> {
    if src.is_empty() {
        return Ok(None);
    }

    let mut rd: &[u8] = &src[..];
    match rmpv::decode::read_value(&mut rd) {
        Ok(value) => {
            let used = src.len() - rd.len();
            src.advance(used);
            Ok(Some(Message::from_value(value)))
        }
        Err(err) if is_incomplete(&err) => {
            if src.len() > max_frame {
                return Err(CodecError::FrameTooLarge {
                    size: src.len(),
                    max: max_frame,
                });
            }
            Ok(None)
        }
        Err(err) => {
            // No length prefix to resync on: drop what is buffered.
            let dropped = src.len();
            src.clear();
            tracing::debug!(dropped, error = %err, "discarding undecodable msgpack input");
            Ok(Some(Err(MessageError::Malformed(format!(
                "{err} ({dropped} bytes discarded)"
            )))))
        }
    }
}

fn is_incomplete(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(io) | rmpv::decode::Error::InvalidDataRead(io) => {
            io.kind() == ErrorKind::UnexpectedEof
        }
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// msgpack-RPC codec for `FramedRead`/`FramedWrite`.
#[derive(Debug, Clone)]
pub struct MsgpackCodec {
    max_frame: usize,
}

impl MsgpackCodec {
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self { max_frame }
    }

    pub fn max_frame(&self) -> usize {
        self.max_frame
    }
}

impl Default for MsgpackCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MsgpackCodec {
    type Item = Decoded;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        decode_message(src, self.max_frame)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::ConnectionClosed),
        }
    }
}

impl Encoder<Message> for MsgpackCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        encode_message(&item, dst, self.max_frame)
    }
}
