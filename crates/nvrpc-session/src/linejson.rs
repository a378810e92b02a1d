//! Line-JSON transport for hosts without native msgpack-RPC.
//!
//! Outbound calls go through a host-side trampoline function:
//!
//! ```text
//! request       ["call", <bridge fn>, [<method without nvim_>, args], id]
//! notification  ["call", <notify fn>, [<method without nvim_>, args]]
//! response      [id, [error, result]]
//! ```
//!
//! Our request ids are negative so they never collide with the host's.

use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use nvrpc_codec::{
    json_to_value, value_to_json, ChannelKind, ChannelMessage, ExtTypes, HandleKind,
    LineJsonCodec, Value,
};
use nvrpc_transport::{BoxedReader, StreamPair};
use serde_json::{json, Value as Json};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error};

use crate::batcher::QueuedCall;
use crate::config::{ClientConfig, ProtocolMode, TransportConfig};
use crate::correlator::{IdDirection, PendingReply};
use crate::error::{Result, RpcError};
use crate::link::{spawn_writer, Link};
use crate::responder::Responder;
use crate::transport::{Transport, TransportEvent};

/// Line-JSON transport over any byte stream.
#[derive(Debug)]
pub struct LineJsonTransport {
    link: Arc<Link<Json>>,
    config: TransportConfig,
    ext: ExtTypes,
}

impl LineJsonTransport {
    /// Start the read and write tasks. Must be called inside a tokio runtime.
    pub fn attach(
        pair: StreamPair,
        config: &ClientConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (reader, writer) = pair.into_parts();
        let (link, outbound) = Link::new("line-json", IdDirection::Descending, config, events);
        let max_line = config.transport.max_frame;

        spawn_writer(
            Arc::downgrade(&link),
            FramedWrite::new(writer, LineJsonCodec::with_max_line(max_line)),
            outbound,
        );
        let frames = FramedRead::new(reader, LineJsonCodec::with_max_line(max_line));
        link.set_reader(tokio::spawn(pump(
            Arc::downgrade(&link),
            frames,
            config.ext_types,
        )));
        debug!(
            bridge = %config.transport.bridge_function_name,
            "line-json transport attached"
        );

        Self {
            link,
            config: config.transport.clone(),
            ext: config.ext_types,
        }
    }

    fn call_args(&self, method: &str, args: &[Value]) -> Json {
        let args: Vec<Json> = args.iter().map(|arg| value_to_json(arg, &self.ext)).collect();
        json!([short_name(method), args])
    }
}

impl Transport for LineJsonTransport {
    fn mode(&self) -> ProtocolMode {
        ProtocolMode::LineJson
    }

    fn request(&self, method: &str, args: Vec<Value>) -> Result<PendingReply> {
        let call = self.call_args(method, &args);
        let function = self.config.bridge_function_name.as_str();
        self.link
            .request(method, |id| json!(["call", function, call, id]))
    }

    fn notify(&self, method: &str, args: Vec<Value>) {
        let line = json!(["call", self.config.bridge_notify_name, self.call_args(method, &args)]);
        self.link.notify(method, &args, line);
    }

    fn detach(&self) {
        self.link.close();
    }

    fn is_attached(&self) -> bool {
        self.link.is_attached()
    }

    fn last_notification(&self) -> Option<QueuedCall> {
        self.link.last_notification()
    }
}

/// `nvim_buf_set_lines` -> `buf_set_lines`.
fn short_name(method: &str) -> &str {
    method.strip_prefix("nvim_").unwrap_or(method)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewrap {
    One(HandleKind),
    List(HandleKind),
}

/// Methods whose results carry handles as bare ids.
const REWRAP: &[(&str, Rewrap)] = &[
    ("nvim_list_wins", Rewrap::List(HandleKind::Window)),
    ("nvim_tabpage_list_wins", Rewrap::List(HandleKind::Window)),
    ("nvim_tabpage_get_win", Rewrap::One(HandleKind::Window)),
    ("nvim_get_current_win", Rewrap::One(HandleKind::Window)),
    ("nvim_open_win", Rewrap::One(HandleKind::Window)),
    ("nvim_list_bufs", Rewrap::List(HandleKind::Buffer)),
    ("nvim_create_buf", Rewrap::One(HandleKind::Buffer)),
    ("nvim_get_current_buf", Rewrap::One(HandleKind::Buffer)),
    ("nvim_list_tabpages", Rewrap::List(HandleKind::Tabpage)),
    ("nvim_get_current_tabpage", Rewrap::One(HandleKind::Tabpage)),
];

/// Turn a JSON result into a value, re-wrapping handle ids by method.
pub(crate) fn rewrap_result(method: &str, result: &Json, ext: &ExtTypes) -> Value {
    let value = json_to_value(result);
    let rule = REWRAP
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, rule)| *rule);
    match (rule, value) {
        (Some(Rewrap::One(kind)), value) => ext.wrap_id(kind, &value).unwrap_or(value),
        (Some(Rewrap::List(kind)), Value::Array(ids)) => Value::Array(
            ids.into_iter()
                .map(|id| ext.wrap_id(kind, &id).unwrap_or(id))
                .collect(),
        ),
        (_, value) => value,
    }
}

/// JavaScript-style falsiness: the host signals "no error" with any of these.
fn is_no_error(error: &Json) -> bool {
    match error {
        Json::Null => true,
        Json::Bool(b) => !b,
        Json::Number(n) => n.as_f64() == Some(0.0),
        Json::String(s) => s.is_empty(),
        _ => false,
    }
}

fn json_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Arguments of an inbound call as msgpack values.
fn inbound_args(args: &Json) -> Vec<Value> {
    match args {
        Json::Array(items) => items.iter().map(json_to_value).collect(),
        Json::Null => Vec::new(),
        other => vec![json_to_value(other)],
    }
}

async fn pump(
    link: Weak<Link<Json>>,
    mut frames: FramedRead<BoxedReader, LineJsonCodec>,
    ext: ExtTypes,
) {
    loop {
        let next = frames.next().await;
        let Some(link) = link.upgrade() else {
            return;
        };
        match next {
            None => {
                link.shutdown("end of stream");
                return;
            }
            Some(Err(err)) => {
                error!(error = %err, "read failed");
                link.shutdown("read error");
                return;
            }
            Some(Ok(Err(bad))) => {
                error!(error = %bad, "invalid data from host");
                link.emit(TransportEvent::Error(RpcError::Framing(bad.to_string())));
            }
            Some(Ok(Ok(frame))) => route(&link, frame, &ext),
        }
    }
}

fn route(link: &Arc<Link<Json>>, frame: ChannelMessage, ext: &ExtTypes) {
    match frame.kind() {
        ChannelKind::Request => match frame.call_parts() {
            Ok((method, args)) => {
                debug!(id = frame.id, method = %method, "received request");
                let responder = Responder::line_json(frame.id, &method, link, *ext);
                link.emit(TransportEvent::Request {
                    method,
                    args: inbound_args(&args),
                    responder,
                });
            }
            Err(bad) => {
                link.send(json!([frame.id, [bad.to_string(), null]]));
                link.emit(TransportEvent::Error(RpcError::Framing(bad.to_string())));
            }
        },
        ChannelKind::Notification => match frame.call_parts() {
            Ok((method, args)) => {
                debug!(method = %method, "received notification");
                link.emit(TransportEvent::Notification {
                    method,
                    args: inbound_args(&args),
                });
            }
            Err(bad) => link.emit(TransportEvent::Error(RpcError::Framing(bad.to_string()))),
        },
        ChannelKind::Response => {
            let Some(reply) = link.correlator().take(frame.id) else {
                return;
            };
            let (error, result) = frame.response_parts();
            debug!(id = frame.id, method = reply.method(), "received response");
            let result = if is_no_error(&error) {
                Ok(rewrap_result(reply.method(), &result, ext))
            } else {
                Err(RpcError::Request {
                    kind: 0,
                    message: json_text(&error),
                })
            };
            link.emit(TransportEvent::Response { reply, result });
        }
    }
}
