//! Plumbing shared by both transports: outbound queue, writer task,
//! pending-request table and one-shot detach.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::SinkExt;
use nvrpc_codec::{CodecError, Value};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Encoder, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::batcher::QueuedCall;
use crate::config::ClientConfig;
use crate::correlator::{Correlator, IdDirection, PendingReply};
use crate::error::{Result, RpcError};
use crate::transport::TransportEvent;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State for one attached stream, generic over the outbound frame type.
#[derive(Debug)]
pub(crate) struct Link<F> {
    name: &'static str,
    correlator: Arc<Correlator>,
    outbound: Mutex<Option<mpsc::UnboundedSender<F>>>,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    last_notification: Mutex<Option<QueuedCall>>,
    request_timeout: Option<Duration>,
}

impl<F: Send + 'static> Link<F> {
    pub(crate) fn new(
        name: &'static str,
        direction: IdDirection,
        config: &ClientConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<F>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(Self {
            name,
            correlator: Arc::new(Correlator::new(direction, config.slow_request_threshold)),
            outbound: Mutex::new(Some(tx)),
            events: Mutex::new(Some(events)),
            reader: Mutex::new(None),
            last_notification: Mutex::new(None),
            request_timeout: config.request_timeout,
        });
        (link, rx)
    }

    pub(crate) fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.correlator.is_attached()
    }

    /// Queue a frame for the writer task. `false` once detached.
    pub(crate) fn send(&self, frame: F) -> bool {
        match lock(&self.outbound).as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Register a request, write it via `frame`, and hand back its reply.
    pub(crate) fn request(
        &self,
        method: &str,
        frame: impl FnOnce(i64) -> F,
    ) -> Result<PendingReply> {
        let (id, rx) = self.correlator.register(method)?;
        debug!(transport = self.name, id, method, "request sent");
        if !self.send(frame(id)) {
            self.correlator.complete(id, Err(RpcError::Disconnected));
        }
        Ok(PendingReply::new(
            id,
            method,
            rx,
            self.correlator.clone(),
            self.request_timeout,
        ))
    }

    /// Write a notification, remembering it for error diagnostics.
    pub(crate) fn notify(&self, method: &str, args: &[Value], frame: F) {
        if !self.is_attached() {
            debug!(transport = self.name, method, "notification dropped, transport detached");
            return;
        }
        debug!(transport = self.name, method, "notification sent");
        *lock(&self.last_notification) = Some((method.to_string(), args.to_vec()));
        self.send(frame);
    }

    pub(crate) fn last_notification(&self) -> Option<QueuedCall> {
        lock(&self.last_notification).clone()
    }

    /// Report an event upward. Nothing is reported after
    /// [`TransportEvent::Detached`].
    pub(crate) fn emit(&self, event: TransportEvent) {
        let events = lock(&self.events);
        let Some(events) = events.as_ref() else {
            debug!(transport = self.name, ?event, "event after detach dropped");
            return;
        };
        if events.send(event).is_err() {
            debug!(transport = self.name, "event receiver gone");
        }
    }

    pub(crate) fn set_reader(&self, handle: JoinHandle<()>) {
        *lock(&self.reader) = Some(handle);
    }

    /// Detach once: flush pending requests, close the outbound queue and
    /// report [`TransportEvent::Detached`].
    pub(crate) fn shutdown(&self, reason: &str) {
        let Some(flushed) = self.correlator.detach() else {
            return;
        };
        lock(&self.outbound).take();
        info!(transport = self.name, reason, flushed, "transport detached");
        let events = lock(&self.events).take();
        if let Some(events) = events {
            if events.send(TransportEvent::Detached).is_err() {
                debug!(transport = self.name, "event receiver gone");
            }
        }
    }

    /// Stop the reader, then detach.
    pub(crate) fn close_with(&self, reason: &str) {
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
        self.shutdown(reason);
    }

    /// Explicit detach from the caller's side.
    pub(crate) fn close(&self) {
        self.close_with("detached by caller");
    }
}

/// Drain the outbound queue into `sink` until the queue closes or a write
/// fails.
pub(crate) fn spawn_writer<F, W, C>(
    link: Weak<Link<F>>,
    mut sink: FramedWrite<W, C>,
    mut rx: mpsc::UnboundedReceiver<F>,
) -> JoinHandle<()>
where
    F: Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    C: Encoder<F, Error = CodecError> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match sink.send(frame).await {
                Ok(()) => {}
                Err(err @ (CodecError::FrameTooLarge { .. } | CodecError::Encode(_))) => {
                    error!(error = %err, "outbound frame dropped");
                }
                Err(err) => {
                    warn!(error = %err, "write failed");
                    if let Some(link) = link.upgrade() {
                        link.close_with("write error");
                    }
                    return;
                }
            }
        }
        if let Err(err) = sink.close().await {
            debug!(error = %err, "closing writer failed");
        }
    })
}
