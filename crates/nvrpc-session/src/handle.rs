use std::fmt;

use nvrpc_codec::{HandleContext, HandleKind, RemoteHandle, Value};

use crate::client::Client;
use crate::dispatch::EventCallback;
use crate::error::Result;

/// Registration hooks the handle layer calls into. Not part of the public
/// client API.
pub(crate) trait EventHooks {
    fn attach_event(&self, handle: RemoteHandle, event: &str, callback: EventCallback) -> bool;
    fn detach_event(&self, handle: RemoteHandle, event: &str, callback: &EventCallback) -> bool;
}

/// A remote buffer, window or tabpage bound to the client that decoded it.
///
/// Holds a borrowed client, so it cannot outlive the session.
#[derive(Clone, Copy)]
pub struct Handle<'c> {
    remote: RemoteHandle,
    client: &'c Client,
}

impl<'c> Handle<'c> {
    pub(crate) fn new(remote: RemoteHandle, client: &'c Client) -> Self {
        Self { remote, client }
    }

    pub fn remote(&self) -> RemoteHandle {
        self.remote
    }

    pub fn id(&self) -> i64 {
        self.remote.id
    }

    pub fn kind(&self) -> HandleKind {
        self.remote.kind
    }

    pub fn client(&self) -> &'c Client {
        self.client
    }

    /// Wire form of this handle.
    pub fn to_value(&self) -> Value {
        self.client.ext_types().pack(self.remote)
    }

    fn method(&self, suffix: &str) -> String {
        format!("{}{}", self.remote.kind.prefix(), suffix)
    }

    fn args(&self, rest: Vec<Value>) -> Vec<Value> {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(self.to_value());
        args.extend(rest);
        args
    }

    /// Call `<prefix><suffix>` with this handle as first argument.
    pub async fn request(&self, suffix: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .request(&self.method(suffix), self.args(args))
            .await
    }

    /// Notify `<prefix><suffix>` with this handle as first argument.
    pub fn notify(&self, suffix: &str, args: Vec<Value>) {
        self.client.notify(&self.method(suffix), self.args(args));
    }

    pub async fn get_var(&self, name: &str) -> Result<Value> {
        self.request("get_var", vec![Value::from(name)]).await
    }

    pub async fn set_var(&self, name: &str, value: Value) -> Result<()> {
        self.request("set_var", vec![Value::from(name), value])
            .await
            .map(|_| ())
    }

    pub async fn del_var(&self, name: &str) -> Result<()> {
        self.request("del_var", vec![Value::from(name)])
            .await
            .map(|_| ())
    }

    pub async fn get_option(&self, name: &str) -> Result<Value> {
        self.request("get_option", vec![Value::from(name)]).await
    }

    pub async fn set_option(&self, name: &str, value: Value) -> Result<()> {
        self.request("set_option", vec![Value::from(name), value])
            .await
            .map(|_| ())
    }

    /// Observe `event` (e.g. `lines`, `changedtick`, `detach`) on a buffer.
    ///
    /// Registering the same callback twice has no effect. Returns whether
    /// the callback was added.
    pub fn on(&self, event: &str, callback: EventCallback) -> bool {
        self.client.attach_event(self.remote, event, callback)
    }

    pub fn off(&self, event: &str, callback: &EventCallback) -> bool {
        self.client.detach_event(self.remote, event, callback)
    }

    /// Whether this buffer currently has event registrations.
    pub fn is_attached(&self) -> bool {
        self.client.is_attached(self.remote.id)
    }
}

impl PartialEq for Handle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.remote == other.remote
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.remote).finish()
    }
}

impl fmt::Display for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.remote, f)
    }
}
