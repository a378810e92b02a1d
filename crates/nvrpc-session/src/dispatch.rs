//! Inbound notification classification and handle event registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nvrpc_codec::{ExtTypes, HandleKind, Value};

/// Method suffix shared by every transport-internal event.
pub const EVENT_SUFFIX: &str = "_event";

/// Family an inbound notification belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    /// Republished verbatim to the user.
    Generic,
    /// `nvim_buf_<event>_event` and friends, for handles under observation.
    HandleLifecycle { kind: HandleKind, event: String },
    /// The host relays a call from another plugin: `[id, method, args]`.
    AsyncRequest,
    /// Reply to one of our bridge requests: `[id, error, result]`.
    AsyncResponse,
    /// Host-side error report: `[kind, message]`.
    ErrorBroadcast,
    /// An `_event` nobody handles.
    Unhandled,
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Prefix(&'static str),
    Exact(&'static str),
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Lifecycle(HandleKind),
    AsyncRequest,
    AsyncResponse,
    ErrorBroadcast,
}

/// Matched against the method name with `_event` stripped, first hit wins.
const RULES: &[(Pattern, Target)] = &[
    (Pattern::Prefix("nvim_buf_"), Target::Lifecycle(HandleKind::Buffer)),
    (Pattern::Prefix("nvim_async_request"), Target::AsyncRequest),
    (Pattern::Prefix("nvim_async_response"), Target::AsyncResponse),
    (Pattern::Exact("nvim_error"), Target::ErrorBroadcast),
];

/// Classify an inbound notification by method name.
pub fn classify(method: &str) -> EventClass {
    let Some(stem) = method.strip_suffix(EVENT_SUFFIX) else {
        return EventClass::Generic;
    };
    for (pattern, target) in RULES {
        let rest = match pattern {
            Pattern::Prefix(prefix) => stem.strip_prefix(*prefix),
            Pattern::Exact(name) => (stem == *name).then_some(""),
        };
        let Some(rest) = rest else { continue };
        return match target {
            Target::Lifecycle(kind) => EventClass::HandleLifecycle {
                kind: *kind,
                event: rest.to_string(),
            },
            Target::AsyncRequest => EventClass::AsyncRequest,
            Target::AsyncResponse => EventClass::AsyncResponse,
            Target::ErrorBroadcast => EventClass::ErrorBroadcast,
        };
    }
    EventClass::Unhandled
}

/// Lifecycle sub-event after which a handle's registration is dropped.
pub const DETACH_EVENT: &str = "detach";

/// Id of the handle an event is about.
///
/// Native hosts send an extension value; line-JSON hosts send the raw id.
pub fn event_handle_id(value: &Value, ext: &ExtTypes) -> Option<i64> {
    match value {
        Value::Ext(..) => ext.try_unpack(value).map(|handle| handle.id),
        other => other.as_i64(),
    }
}

/// Callback invoked with the event's full argument list.
#[derive(Clone)]
pub struct EventCallback(Arc<dyn Fn(&[Value]) + Send + Sync>);

impl EventCallback {
    pub fn new(f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) {
        (self.0)(args)
    }

    /// Identity comparison; clones of one callback are the same callback.
    pub fn same(&self, other: &EventCallback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventCallback")
            .field(&Arc::as_ptr(&self.0))
            .finish()
    }
}

/// `(handle id, event name) -> callbacks`, in registration order.
#[derive(Debug, Default)]
pub struct EventRegistry {
    handles: HashMap<i64, HashMap<String, Vec<EventCallback>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `callback`; registering the same callback twice is a no-op.
    pub fn register(&mut self, handle: i64, event: &str, callback: EventCallback) -> bool {
        let callbacks = self
            .handles
            .entry(handle)
            .or_default()
            .entry(event.to_string())
            .or_default();
        if callbacks.iter().any(|cb| cb.same(&callback)) {
            return false;
        }
        callbacks.push(callback);
        true
    }

    /// Remove `callback`. The handle stays observed until its detach event.
    pub fn unregister(&mut self, handle: i64, event: &str, callback: &EventCallback) -> bool {
        let Some(callbacks) = self
            .handles
            .get_mut(&handle)
            .and_then(|events| events.get_mut(event))
        else {
            return false;
        };
        let before = callbacks.len();
        callbacks.retain(|cb| !cb.same(callback));
        callbacks.len() != before
    }

    pub fn is_attached(&self, handle: i64) -> bool {
        self.handles.contains_key(&handle)
    }

    /// Snapshot of the callbacks for one event, `None` if the handle is not
    /// observed.
    pub fn callbacks(&self, handle: i64, event: &str) -> Option<Vec<EventCallback>> {
        let events = self.handles.get(&handle)?;
        Some(events.get(event).cloned().unwrap_or_default())
    }

    /// Drop every registration for a handle.
    pub fn remove(&mut self, handle: i64) -> bool {
        self.handles.remove(&handle).is_some()
    }
}
