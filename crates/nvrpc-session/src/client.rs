//! The session front end: batching, event dispatch and handle binding on
//! top of a [`Transport`].
//!
//! ```text
//!   Client::notify ──► PauseStack ──(paused)──► queue[level]
//!                          │
//!                          └──(not paused)──► Transport::notify ──► wire
//!
//!   wire ──► Transport ──► TransportEvent ──► dispatch task ──► responses
//!                                               │ classify()
//!            ┌──────────────┬─────────────┬─────┴──────┬──────────────┐
//!          Generic     HandleLifecycle  AsyncRequest AsyncResponse  ErrorBroadcast
//!         HostEvent    EventRegistry     HostEvent   async waiter     tracing
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use nvrpc_codec::{
    call_list, AtomicResult, CodecError, ExtTypes, HandleContext, HandleKind, RemoteHandle,
    Value, CALL_ATOMIC,
};
use nvrpc_transport::{Endpoint, StreamPair};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::batcher::{PauseStack, QueuedCall};
use crate::config::{ClientConfig, ProtocolMode};
use crate::correlator::PendingReply;
use crate::dispatch::{classify, event_handle_id, EventCallback, EventClass, EventRegistry, DETACH_EVENT};
use crate::error::{value_text, Result, RpcError};
use crate::handle::{EventHooks, Handle};
use crate::link::lock;
use crate::linejson::LineJsonTransport;
use crate::native::NativeTransport;
use crate::responder::{Notify, Responder, CALL_FUNCTION};
use crate::transport::{Transport, TransportEvent};

/// Method returning `[channel_id, metadata]`.
pub const GET_API_INFO: &str = "nvim_get_api_info";

/// What the session hands to the application.
#[derive(Debug)]
pub enum HostEvent {
    /// The host (or a plugin relayed through it) called us.
    Request {
        method: String,
        args: Vec<Value>,
        responder: Responder,
    },
    /// A notification not consumed by the session itself.
    Notification { method: String, args: Vec<Value> },
    /// Something went wrong that no caller is waiting on.
    Diagnostic(RpcError),
    /// The transport detached. Last event.
    Disconnected,
}

/// Receiving end of [`HostEvent`]s.
pub type HostEvents = mpsc::UnboundedReceiver<HostEvent>;

/// How `resume` replays a level's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResumeOptions {
    /// Send the batch as a notification instead of awaiting its result.
    pub replay_as_notify: bool,
    /// Ask a line-JSON host to redraw first. Ignored for native hosts.
    pub redraw: bool,
}

/// The queued call an atomic replay stopped at.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub index: usize,
    pub method: String,
    pub args: Vec<Value>,
    pub kind: i64,
    pub message: String,
}

/// Result of replaying one pause level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomicOutcome {
    /// Results of the calls that ran, in queue order.
    pub results: Vec<Value>,
    pub failure: Option<BatchFailure>,
}

/// Host facts learned from `nvim_get_api_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiInfo {
    pub channel_id: i64,
    pub functions: Vec<String>,
}

#[derive(Debug)]
struct ClientState {
    pauses: PauseStack,
    registry: EventRegistry,
    async_requests: HashMap<i64, oneshot::Sender<Result<Value>>>,
    next_async_id: i64,
    channel_id: Option<i64>,
    functions: Option<Vec<String>>,
}

#[derive(Debug)]
struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    state: Mutex<ClientState>,
    events: mpsc::UnboundedSender<HostEvent>,
}

/// An attached RPC session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Attach to a byte stream and start the session tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn attach(pair: StreamPair, config: ClientConfig) -> (Client, HostEvents) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let transport: Arc<dyn Transport> = match config.transport.protocol_mode {
            ProtocolMode::Native => Arc::new(NativeTransport::attach(pair, &config, transport_tx)),
            ProtocolMode::LineJson => {
                Arc::new(LineJsonTransport::attach(pair, &config, transport_tx))
            }
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ClientInner {
            transport,
            config,
            state: Mutex::new(ClientState {
                pauses: PauseStack::new(),
                registry: EventRegistry::new(),
                async_requests: HashMap::new(),
                next_async_id: 1,
                channel_id: None,
                functions: None,
            }),
            events: events_tx,
        });
        tokio::spawn(dispatch(Arc::downgrade(&inner), transport_rx));
        (Client { inner }, events_rx)
    }

    /// Connect to `endpoint` and attach.
    pub async fn connect(endpoint: &Endpoint, config: ClientConfig) -> Result<(Client, HostEvents)> {
        let pair = endpoint.connect().await?;
        debug!(endpoint = %endpoint, transport = endpoint.transport_name(), "connected");
        Ok(Self::attach(pair, config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> ProtocolMode {
        self.inner.transport.mode()
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        lock(&self.inner.state)
    }

    /// Whether the transport is still attached.
    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_attached()
    }

    /// Issue a request and wait for its reply.
    ///
    /// Requests are never queued by [`Client::pause`].
    pub async fn request(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.start_request(method, args)?.recv().await
    }

    /// Issue a request without waiting; await the returned reply later.
    pub fn start_request(&self, method: &str, args: Vec<Value>) -> Result<PendingReply> {
        self.inner.transport.request(method, args)
    }

    /// Send a notification, or queue it on the current pause level.
    pub fn notify(&self, method: &str, args: Vec<Value>) {
        self.inner.notify(method, args);
    }

    /// Open a new pause level and return it.
    ///
    /// A level left open longer than `stale_pause_after` is reported once
    /// through `tracing::error!` and [`HostEvent::Diagnostic`].
    pub fn pause(&self) -> usize {
        let ticket = self.state().pauses.push();
        let stale_after = self.inner.config.stale_pause_after;
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(stale_after).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let age = lock(&inner.state).pauses.check_stale(ticket, stale_after);
            if let Some(age) = age {
                error!(level = ticket.level, ?age, "pause level not resumed");
                inner.emit(HostEvent::Diagnostic(RpcError::StalePause {
                    level: ticket.level,
                    age,
                }));
            }
        });
        debug!(level = ticket.level, "notifications paused");
        ticket.level
    }

    /// Current pause level, 0 when not paused.
    pub fn pause_level(&self) -> usize {
        self.state().pauses.level()
    }

    /// Close the top pause level and replay its queue as one atomic batch.
    ///
    /// A failing call inside the batch is reported in
    /// [`AtomicOutcome::failure`], attributed to its queued call. The batch
    /// request itself failing is an `Err`.
    pub async fn resume(&self, level: usize, options: ResumeOptions) -> Result<AtomicOutcome> {
        let queue = self.state().pauses.pop(level)?;
        debug!(level, queued = queue.len(), "notifications resumed");

        if options.redraw && self.mode() == ProtocolMode::LineJson {
            self.inner
                .transport
                .notify("nvim_command", vec![Value::from("redraw")]);
        }
        if queue.is_empty() {
            return Ok(AtomicOutcome::default());
        }

        let calls = call_list(&queue);
        if options.replay_as_notify {
            self.inner.transport.notify(CALL_ATOMIC, vec![calls]);
            return Ok(AtomicOutcome::default());
        }

        let value = self.request(CALL_ATOMIC, vec![calls]).await?;
        let atomic =
            AtomicResult::from_value(value).map_err(|err| RpcError::Protocol(err.to_string()))?;
        let failure = atomic.error.map(|err| {
            let (method, args) = queue.get(err.index).cloned().unwrap_or_default();
            warn!(
                level,
                index = err.index,
                method = %method,
                message = %err.message,
                "queued call failed during atomic replay"
            );
            BatchFailure {
                index: err.index,
                method,
                args,
                kind: err.kind,
                message: err.message,
            }
        });
        Ok(AtomicOutcome {
            results: atomic.results,
            failure,
        })
    }

    /// Close the top pause level and discard its queue.
    pub fn cancel(&self, level: usize) -> Result<usize> {
        let queue = self.state().pauses.pop(level)?;
        debug!(level, discarded = queue.len(), "pause cancelled");
        Ok(queue.len())
    }

    /// Call `method` through the host's async bridge and wait for the
    /// matching `nvim_async_response_event`.
    pub async fn send_async_request(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        if !self.is_connected() {
            return Err(RpcError::Disconnected);
        }
        let (id, rx) = {
            let mut state = self.state();
            let id = state.next_async_id;
            state.next_async_id += 1;
            let (tx, rx) = oneshot::channel();
            state.async_requests.insert(id, tx);
            (id, rx)
        };
        debug!(id, method, "async request sent");
        self.notify(
            CALL_FUNCTION,
            vec![
                Value::from(self.inner.config.async_request_function.as_str()),
                Value::Array(vec![Value::from(id), Value::from(method), Value::Array(args)]),
            ],
        );

        let outcome = match self.inner.config.request_timeout {
            Some(after) => match tokio::time::timeout(after, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.state().async_requests.remove(&id);
                    warn!(id, method, ?after, "async request timed out");
                    return Err(RpcError::Timeout {
                        method: method.to_string(),
                        after,
                    });
                }
            },
            None => rx.await,
        };
        outcome.unwrap_or(Err(RpcError::Disconnected))
    }

    /// Fetch `[channel_id, metadata]` and remember the function list.
    pub async fn fetch_api_info(&self) -> Result<ApiInfo> {
        let value = self.request(GET_API_INFO, Vec::new()).await?;
        let info = parse_api_info(&value)?;
        let mut state = self.state();
        state.channel_id = Some(info.channel_id);
        state.functions = Some(info.functions.clone());
        debug!(channel_id = info.channel_id, functions = info.functions.len(), "api info loaded");
        Ok(info)
    }

    /// Whether the host exposes `name`. True until the API is known.
    pub fn has_function(&self, name: &str) -> bool {
        match &self.state().functions {
            Some(functions) => functions.iter().any(|f| f == name),
            None => true,
        }
    }

    pub fn channel_id(&self) -> Option<i64> {
        self.state().channel_id
    }

    pub fn is_api_ready(&self) -> bool {
        self.is_connected() && self.channel_id().is_some()
    }

    /// Ask a line-JSON host to redraw. No-op for native hosts.
    pub fn redraw_vim(&self, force: bool) {
        if self.mode() != ProtocolMode::LineJson {
            return;
        }
        let command = if force { "redraw!" } else { "redraw" };
        self.inner
            .transport
            .notify("nvim_command", vec![Value::from(command)]);
    }

    /// The last notification written to the host.
    pub fn last_notification(&self) -> Option<QueuedCall> {
        self.inner.transport.last_notification()
    }

    /// Detach the transport. Pending requests fail with
    /// [`RpcError::Disconnected`].
    pub fn detach(&self) {
        self.inner.transport.detach();
    }

    /// Whether any events are registered for buffer `id`.
    pub fn is_attached(&self, id: i64) -> bool {
        self.state().registry.is_attached(id)
    }

    pub fn create_buffer(&self, id: i64) -> Handle<'_> {
        self.bind(RemoteHandle::buffer(id))
    }

    pub fn create_window(&self, id: i64) -> Handle<'_> {
        self.bind(RemoteHandle::window(id))
    }

    pub fn create_tabpage(&self, id: i64) -> Handle<'_> {
        self.bind(RemoteHandle::tabpage(id))
    }

    /// Decode an extension value into a handle bound to this client.
    pub fn decode_handle(&self, value: &Value) -> Result<Handle<'_>> {
        nvrpc_codec::decode_handle(value, self).map_err(|err| match err {
            CodecError::UnknownExtension(tag) => {
                warn!(tag, "unknown extension type");
                RpcError::Protocol(err.to_string())
            }
            other => RpcError::Protocol(other.to_string()),
        })
    }
}

impl HandleContext for Client {
    type Bound<'c> = Handle<'c>;

    fn ext_types(&self) -> &ExtTypes {
        &self.inner.config.ext_types
    }

    fn bind(&self, handle: RemoteHandle) -> Handle<'_> {
        Handle::new(handle, self)
    }
}

impl EventHooks for Client {
    fn attach_event(&self, handle: RemoteHandle, event: &str, callback: EventCallback) -> bool {
        if handle.kind != HandleKind::Buffer {
            debug!(%handle, event, "events are only delivered for buffers");
            return false;
        }
        self.state().registry.register(handle.id, event, callback)
    }

    fn detach_event(&self, handle: RemoteHandle, event: &str, callback: &EventCallback) -> bool {
        self.state().registry.unregister(handle.id, event, callback)
    }
}

fn parse_api_info(value: &Value) -> Result<ApiInfo> {
    let malformed = || RpcError::Protocol(format!("unexpected {GET_API_INFO} result: {value}"));
    let Value::Array(parts) = value else {
        return Err(malformed());
    };
    let channel_id = parts.first().and_then(Value::as_i64).ok_or_else(malformed)?;
    let functions = parts
        .get(1)
        .and_then(|metadata| map_get(metadata, "functions"))
        .and_then(Value::as_array)
        .map(|functions| {
            functions
                .iter()
                .filter_map(|f| map_get(f, "name"))
                .map(value_text)
                .collect()
        })
        .unwrap_or_default();
    Ok(ApiInfo {
        channel_id,
        functions,
    })
}

fn map_get<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

/// Host "no error" markers on the async bridge.
fn is_empty_error(value: &Value) -> bool {
    match value {
        Value::Nil => true,
        Value::Boolean(b) => !b,
        Value::String(s) => s.as_bytes().is_empty(),
        Value::Integer(i) => i.as_i64() == Some(0),
        _ => false,
    }
}

impl ClientInner {
    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            debug!("host event receiver gone");
        }
    }

    fn on_notification(self: &Arc<Self>, method: String, args: Vec<Value>) {
        match classify(&method) {
            EventClass::Generic => self.emit(HostEvent::Notification { method, args }),
            EventClass::HandleLifecycle { event, .. } => self.on_handle_event(&method, &event, &args),
            EventClass::AsyncRequest => self.on_async_request(args),
            EventClass::AsyncResponse => self.on_async_response(args),
            EventClass::ErrorBroadcast => {
                let kind = args.first().cloned().unwrap_or(Value::Nil);
                let message = args.get(1).map(value_text).unwrap_or_default();
                let last = self.transport.last_notification();
                error!(
                    %kind,
                    message = %message,
                    last_notification = ?last,
                    "error event from host"
                );
            }
            EventClass::Unhandled => debug!(method = %method, ?args, "unhandled event"),
        }
    }

    fn on_handle_event(&self, method: &str, event: &str, args: &[Value]) {
        let Some(id) = args
            .first()
            .and_then(|value| event_handle_id(value, &self.config.ext_types))
        else {
            warn!(method, "handle event without a handle");
            return;
        };
        let callbacks = lock(&self.state).registry.callbacks(id, event);
        let Some(callbacks) = callbacks else {
            debug!(method, id, "event for unobserved handle dropped");
            return;
        };
        for callback in &callbacks {
            callback.call(args);
        }
        if event == DETACH_EVENT {
            lock(&self.state).registry.remove(id);
            debug!(id, "handle detached, registrations removed");
        }
    }

    fn on_async_request(self: &Arc<Self>, args: Vec<Value>) {
        let mut args = args.into_iter();
        let (Some(id), Some(method)) = (args.next().and_then(|id| id.as_i64()), args.next()) else {
            warn!("malformed async request event");
            self.emit(HostEvent::Diagnostic(RpcError::Framing(
                "async request event without id and method".to_string(),
            )));
            return;
        };
        let method = value_text(&method);
        let call_args = match args.next() {
            Some(Value::Array(items)) => items,
            Some(Value::Nil) | None => Vec::new(),
            Some(other) => vec![other],
        };
        debug!(id, method = %method, "received async request");
        let notifier: Weak<dyn Notify> = Arc::downgrade(self) as Weak<ClientInner>;
        let responder =
            Responder::async_bridge(id, &method, notifier, &self.config.async_response_function);
        self.emit(HostEvent::Request {
            method,
            args: call_args,
            responder,
        });
    }

    fn on_async_response(&self, args: Vec<Value>) {
        let Some(id) = args.first().and_then(Value::as_i64) else {
            warn!("async response event without id");
            return;
        };
        let waiter = lock(&self.state).async_requests.remove(&id);
        let Some(waiter) = waiter else {
            warn!(id, "response not found for async request");
            return;
        };
        let error = args.get(1).cloned().unwrap_or(Value::Nil);
        let outcome = if is_empty_error(&error) {
            Ok(args.get(2).cloned().unwrap_or(Value::Nil))
        } else {
            Err(RpcError::Remote(value_text(&error)))
        };
        let _ = waiter.send(outcome);
    }

    fn on_detached(&self) {
        let waiters: Vec<_> = lock(&self.state).async_requests.drain().collect();
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(RpcError::Disconnected));
        }
        self.emit(HostEvent::Disconnected);
    }
}

impl Notify for ClientInner {
    fn notify(&self, method: &str, args: Vec<Value>) {
        if !self.transport.is_attached() {
            debug!(method, "notification dropped, transport detached");
            return;
        }
        let queued = lock(&self.state).pauses.enqueue(method.to_string(), args);
        match queued {
            Ok(level) => debug!(method, level, "notification queued"),
            Err((method, args)) => self.transport.notify(&method, args),
        }
    }

    fn is_attached(&self) -> bool {
        self.transport.is_attached()
    }
}

async fn dispatch(inner: Weak<ClientInner>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Request {
                method,
                args,
                responder,
            } => inner.emit(HostEvent::Request {
                method,
                args,
                responder,
            }),
            TransportEvent::Notification { method, args } => inner.on_notification(method, args),
            TransportEvent::Response { reply, result } => reply.finish(result),
            TransportEvent::Error(err) => inner.emit(HostEvent::Diagnostic(err)),
            TransportEvent::Detached => {
                inner.on_detached();
                return;
            }
        }
    }
}
