//! msgpack-RPC transport.

use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use nvrpc_codec::{Message, MessageError, MsgpackCodec, Value};
use nvrpc_transport::{BoxedReader, StreamPair};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error};

use crate::batcher::QueuedCall;
use crate::config::{ClientConfig, ProtocolMode};
use crate::correlator::{IdDirection, PendingReply};
use crate::error::{Result, RpcError};
use crate::link::{spawn_writer, Link};
use crate::responder::Responder;
use crate::transport::{Transport, TransportEvent};

/// Native msgpack-RPC over any byte stream.
#[derive(Debug)]
pub struct NativeTransport {
    link: Arc<Link<Message>>,
}

impl NativeTransport {
    /// Start the read and write tasks. Must be called inside a tokio runtime.
    pub fn attach(
        pair: StreamPair,
        config: &ClientConfig,
        events: tokio::sync::mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (reader, writer) = pair.into_parts();
        let (link, outbound) = Link::new("native", IdDirection::Ascending, config, events);
        let codec = MsgpackCodec::with_max_frame(config.transport.max_frame);

        spawn_writer(
            Arc::downgrade(&link),
            FramedWrite::new(writer, codec.clone()),
            outbound,
        );
        let frames = FramedRead::new(reader, codec);
        link.set_reader(tokio::spawn(pump(Arc::downgrade(&link), frames)));
        debug!("native transport attached");

        Self { link }
    }
}

impl Transport for NativeTransport {
    fn mode(&self) -> ProtocolMode {
        ProtocolMode::Native
    }

    fn request(&self, method: &str, args: Vec<Value>) -> Result<PendingReply> {
        self.link
            .request(method, |id| Message::request(id, method, args))
    }

    fn notify(&self, method: &str, args: Vec<Value>) {
        let frame = Message::notification(method, args.clone());
        self.link.notify(method, &args, frame);
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

async fn pump(link: Weak<Link<Message>>, mut frames: FramedRead<BoxedReader, MsgpackCodec>) {
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
                error!(error = %bad, "dropping undecodable message");
                if let MessageError::InvalidRequest { id, reason } = &bad {
                    link.send(Message::response(*id, Err(Value::from(reason.as_str()))));
                }
                link.emit(TransportEvent::Error(RpcError::Framing(bad.to_string())));
            }
            Some(Ok(Ok(message))) => route(&link, message),
        }
    }
}

fn route(link: &Arc<Link<Message>>, message: Message) {
    match message {
        Message::Request { id, method, args } => {
            debug!(id, method = %method, "received request");
            let responder = Responder::native(id, &method, link);
            link.emit(TransportEvent::Request {
                method,
                args,
                responder,
            });
        }
        Message::Response { id, result } => {
            let Some(reply) = link.correlator().take(id) else {
                return;
            };
            debug!(id, method = reply.method(), ok = result.is_ok(), "received response");
            link.emit(TransportEvent::Response {
                reply,
                result: result.map_err(|error| RpcError::from_remote(&error)),
            });
        }
        Message::Notification { method, args } => {
            debug!(method = %method, "received notification");
            link.emit(TransportEvent::Notification { method, args });
        }
    }
}
