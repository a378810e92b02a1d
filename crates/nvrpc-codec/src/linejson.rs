//! Line-delimited JSON codec for hosts without native msgpack-RPC.
//!
//! Every frame is one JSON array terminated by `\n`. Inbound frames are
//! `[id, payload]`:
//! - `id > 0`: request from the host, payload `[method, args]`
//! - `id == 0`: notification, payload `[event, args]`
//! - `id < 0`: response to one of our requests, payload `[error, result]`

use bytes::{Buf, BytesMut};
use serde_json::Value as Json;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CodecError, MessageError, Result};
use crate::msgpack::DEFAULT_MAX_FRAME;

/// How an inbound `[id, payload]` frame is to be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Request,
    Notification,
    Response,
}

/// One inbound line-JSON frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub id: i64,
    pub payload: Json,
}

impl ChannelMessage {
    pub fn kind(&self) -> ChannelKind {
        match self.id {
            id if id > 0 => ChannelKind::Request,
            0 => ChannelKind::Notification,
            _ => ChannelKind::Response,
        }
    }

    /// Split a request or notification payload into `(name, args)`.
    pub fn call_parts(&self) -> std::result::Result<(String, Json), MessageError> {
        let Json::Array(items) = &self.payload else {
            return Err(MessageError::Malformed(format!(
                "expected [name, args], got {}",
                self.payload
            )));
        };
        let name = match items.first() {
            Some(Json::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => return Err(MessageError::Malformed("missing name".to_string())),
        };
        let args = items.get(1).cloned().unwrap_or(Json::Null);
        Ok((name, args))
    }

    /// Split a response payload into `(error, result)`.
    ///
    /// A payload that is not an array is the error itself.
    pub fn response_parts(&self) -> (Json, Json) {
        match &self.payload {
            Json::Array(items) => (
                items.first().cloned().unwrap_or(Json::Null),
                items.get(1).cloned().unwrap_or(Json::Null),
            ),
            other => (other.clone(), Json::Null),
        }
    }

    fn parse(line: &[u8]) -> std::result::Result<Self, MessageError> {
        let json: Json = serde_json::from_slice(line).map_err(|err| {
            MessageError::Malformed(format!(
                "invalid json from host ({err}): {}",
                String::from_utf8_lossy(line)
            ))
        })?;
        let Json::Array(mut items) = json else {
            return Err(MessageError::Malformed(format!(
                "expected [id, payload], got {json}"
            )));
        };
        let id = items
            .first()
            .and_then(Json::as_i64)
            .ok_or_else(|| MessageError::Malformed("missing numeric id".to_string()))?;
        let payload = if items.len() > 1 {
            items.swap_remove(1)
        } else {
            Json::Null
        };
        Ok(ChannelMessage { id, payload })
    }
}

/// Newline-delimited JSON codec.
///
/// Decodes inbound `[id, payload]` frames, encodes any outbound JSON value.
#[derive(Debug, Clone)]
pub struct LineJsonCodec {
    max_line: usize,
    /// Bytes already scanned for a newline.
    scanned: usize,
}

impl LineJsonCodec {
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_FRAME)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            max_line,
            scanned: 0,
        }
    }
}

impl Default for LineJsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineJsonCodec {
    type Item = std::result::Result<ChannelMessage, MessageError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = src.len();
                if src.len() > self.max_line {
                    return Err(CodecError::FrameTooLarge {
                        size: src.len(),
                        max: self.max_line,
                    });
                }
                return Ok(None);
            };

            let end = self.scanned + offset;
            self.scanned = 0;
            let line = src.split_to(end);
            src.advance(1);

            let line = trim_line(&line);
            if line.is_empty() {
                continue;
            }
            return Ok(Some(ChannelMessage::parse(line)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        self.scanned = 0;
        if src.is_empty() {
            return Ok(None);
        }
        // Final line without a trailing newline.
        let line = src.split_to(src.len());
        let line = trim_line(&line);
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(ChannelMessage::parse(line)))
    }
}

impl Encoder<Json> for LineJsonCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Json, dst: &mut BytesMut) -> Result<()> {
        let line = serde_json::to_vec(&item)?;
        if line.len() > self.max_line {
            return Err(CodecError::FrameTooLarge {
                size: line.len(),
                max: self.max_line,
            });
        }
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(&line);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut line = line;
    while let [rest @ .., b'\r' | b' ' | b'\t'] = line {
        line = rest;
    }
    line
}
