use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use nvrpc_codec::{value_to_json, ExtTypes, Message, Value};
use serde_json::{json, Value as Json};
use tracing::{debug, warn};

use crate::link::Link;

/// Host function used to answer requests relayed through the async bridge.
pub(crate) const CALL_FUNCTION: &str = "nvim_call_function";

/// Outbound notifications that honour the session's pause levels.
pub(crate) trait Notify: Send + Sync {
    fn notify(&self, method: &str, args: Vec<Value>);

    fn is_attached(&self) -> bool;
}

enum Route {
    Native(Weak<Link<Message>>),
    LineJson {
        link: Weak<Link<Json>>,
        ext: ExtTypes,
    },
    /// Reply by notifying `function` with `[id, result_or_error, is_error]`.
    AsyncBridge {
        notifier: Weak<dyn Notify>,
        function: String,
    },
}

/// Completes one host-originated request.
///
/// Replies exactly once: [`Responder::send`] consumes it. Dropping an
/// unanswered responder sends an error reply so the host does not hang.
pub struct Responder {
    id: i64,
    method: String,
    received_at: Instant,
    route: Option<Route>,
}

impl Responder {
    pub(crate) fn native(id: i64, method: &str, link: &Arc<Link<Message>>) -> Self {
        Self::with_route(id, method, Route::Native(Arc::downgrade(link)))
    }

    pub(crate) fn line_json(id: i64, method: &str, link: &Arc<Link<Json>>, ext: ExtTypes) -> Self {
        Self::with_route(
            id,
            method,
            Route::LineJson {
                link: Arc::downgrade(link),
                ext,
            },
        )
    }

    pub(crate) fn async_bridge(
        id: i64,
        method: &str,
        notifier: Weak<dyn Notify>,
        function: &str,
    ) -> Self {
        Self::with_route(
            id,
            method,
            Route::AsyncBridge {
                notifier,
                function: function.to_string(),
            },
        )
    }

    fn with_route(id: i64, method: &str, route: Route) -> Self {
        Self {
            id,
            method: method.to_string(),
            received_at: Instant::now(),
            route: Some(route),
        }
    }

    /// Request id as sent by the host.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Reply with a result or an error value.
    pub fn send(mut self, result: Result<Value, Value>) {
        if let Some(route) = self.route.take() {
            self.deliver(route, result);
        }
    }

    pub fn ok(self, value: Value) {
        self.send(Ok(value));
    }

    pub fn error(self, message: impl Into<String>) {
        self.send(Err(Value::from(message.into())));
    }

    fn deliver(&self, route: Route, result: Result<Value, Value>) {
        let elapsed = self.received_at.elapsed();
        let sent = match route {
            Route::Native(link) => match link.upgrade() {
                Some(link) if link.is_attached() => link.send(Message::response(self.id, result)),
                _ => false,
            },
            Route::LineJson { link, ext } => match link.upgrade() {
                Some(link) if link.is_attached() => {
                    let (error, value) = match result {
                        Ok(value) => (Json::Null, value_to_json(&value, &ext)),
                        Err(error) => (value_to_json(&error, &ext), Json::Null),
                    };
                    link.send(json!([self.id, [error, value]]))
                }
                _ => false,
            },
            Route::AsyncBridge { notifier, function } => match notifier.upgrade() {
                Some(notifier) if notifier.is_attached() => {
                    let (payload, is_error) = match result {
                        Ok(value) => (value, false),
                        Err(error) => (error, true),
                    };
                    notifier.notify(
                        CALL_FUNCTION,
                        vec![
                            Value::from(function.as_str()),
                            Value::Array(vec![
                                Value::from(self.id),
                                payload,
                                Value::from(is_error),
                            ]),
                        ],
                    );
                    true
                }
                _ => false,
            },
        };
        if sent {
            debug!(id = self.id, method = %self.method, ?elapsed, "response sent");
        } else {
            debug!(id = self.id, method = %self.method, "response skipped, transport detached");
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(route) = self.route.take() {
            warn!(id = self.id, method = %self.method, "request dropped without a response");
            self.deliver(route, Err(Value::from("request dropped without a response")));
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("answered", &self.route.is_none())
            .finish()
    }
}
