//! Remote object handles and their msgpack extension types.
//!
//! The host hands out buffers, windows and tabpages as msgpack `ext` values:
//! the ext tag selects the kind, the payload is the msgpack-encoded numeric id.

use std::fmt;

use rmpv::Value;

use crate::error::{CodecError, Result};

/// The three kinds of remote object the host exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Buffer,
    Window,
    Tabpage,
}

impl HandleKind {
    pub const ALL: [HandleKind; 3] = [HandleKind::Buffer, HandleKind::Window, HandleKind::Tabpage];

    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Buffer => "Buffer",
            HandleKind::Window => "Window",
            HandleKind::Tabpage => "Tabpage",
        }
    }

    /// API method prefix for calls scoped to this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            HandleKind::Buffer => "nvim_buf_",
            HandleKind::Window => "nvim_win_",
            HandleKind::Tabpage => "nvim_tabpage_",
        }
    }

    /// Extension tag the host uses unless it advertises otherwise.
    pub fn default_tag(self) -> i8 {
        match self {
            HandleKind::Buffer => 0,
            HandleKind::Window => 1,
            HandleKind::Tabpage => 2,
        }
    }

    fn index(self) -> usize {
        match self {
            HandleKind::Buffer => 0,
            HandleKind::Window => 1,
            HandleKind::Tabpage => 2,
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plain `{kind, id}` reference to a host object.
///
/// Owned by whoever wraps it; the codec only marshals it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteHandle {
    pub kind: HandleKind,
    pub id: i64,
}

impl RemoteHandle {
    pub fn new(kind: HandleKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn buffer(id: i64) -> Self {
        Self::new(HandleKind::Buffer, id)
    }

    pub fn window(id: i64) -> Self {
        Self::new(HandleKind::Window, id)
    }

    pub fn tabpage(id: i64) -> Self {
        Self::new(HandleKind::Tabpage, id)
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// Registered extension-type packers/unpackers, one tag per handle kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtTypes {
    tags: [i8; 3],
}

impl Default for ExtTypes {
    fn default() -> Self {
        Self {
            tags: HandleKind::ALL.map(HandleKind::default_tag),
        }
    }
}

impl ExtTypes {
    pub fn new(buffer: i8, window: i8, tabpage: i8) -> Self {
        Self {
            tags: [buffer, window, tabpage],
        }
    }

    pub fn tag(&self, kind: HandleKind) -> i8 {
        self.tags[kind.index()]
    }

    pub fn kind_for_tag(&self, tag: i8) -> Option<HandleKind> {
        HandleKind::ALL
            .into_iter()
            .find(|kind| self.tag(*kind) == tag)
    }

    /// Pack a handle as `ext(tag, msgpack(id))`.
    pub fn pack(&self, handle: RemoteHandle) -> Value {
        let mut payload = Vec::with_capacity(9);
        // Writing into a Vec cannot fail.
        let _ = rmpv::encode::write_value(&mut payload, &Value::from(handle.id));
        Value::Ext(self.tag(handle.kind), payload)
    }

    /// Unpack an `ext` value into a handle.
    pub fn unpack(&self, value: &Value) -> Result<RemoteHandle> {
        let Value::Ext(tag, payload) = value else {
            return Err(CodecError::NotAHandle(value.to_string()));
        };
        let kind = self
            .kind_for_tag(*tag)
            .ok_or(CodecError::UnknownExtension(*tag))?;
        let mut rd: &[u8] = payload;
        let id = rmpv::decode::read_value(&mut rd)
            .ok()
            .and_then(|id| id.as_i64())
            .ok_or_else(|| CodecError::NotAHandle(format!("{kind} payload {payload:?}")))?;
        Ok(RemoteHandle::new(kind, id))
    }

    /// Like [`ExtTypes::unpack`] but for callers that only care about success.
    pub fn try_unpack(&self, value: &Value) -> Option<RemoteHandle> {
        self.unpack(value).ok()
    }

    /// Wrap a raw numeric id (as returned over line-JSON) into a handle value.
    pub fn wrap_id(&self, kind: HandleKind, id: &Value) -> Option<Value> {
        id.as_i64().map(|id| self.pack(RemoteHandle::new(kind, id)))
    }

    /// Replace every registered handle inside `value` by its numeric id.
    pub fn flatten(&self, value: &Value) -> Value {
        match value {
            Value::Ext(..) => match self.unpack(value) {
                Ok(handle) => Value::from(handle.id),
                Err(_) => value.clone(),
            },
            Value::Array(items) => Value::Array(items.iter().map(|v| self.flatten(v)).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (self.flatten(k), self.flatten(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Context a decoded handle is bound to so it becomes method-callable.
///
/// Decoding a handle is contextual: the raw `{kind, id}` is paired with a
/// borrowed reference to its owning client, never an owning back-pointer.
pub trait HandleContext {
    /// The callable object produced for a handle.
    type Bound<'c>
    where
        Self: 'c;

    fn ext_types(&self) -> &ExtTypes;

    fn bind(&self, handle: RemoteHandle) -> Self::Bound<'_>;
}

/// Decode an extension value within `ctx`.
pub fn decode_handle<'c, C: HandleContext>(value: &Value, ctx: &'c C) -> Result<C::Bound<'c>> {
    let handle = ctx.ext_types().unpack(value)?;
    Ok(ctx.bind(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        ext: ExtTypes,
        name: &'static str,
    }

    struct BoundHandle<'c> {
        handle: RemoteHandle,
        owner: &'c Recorder,
    }

    impl HandleContext for Recorder {
        type Bound<'c> = BoundHandle<'c>;

        fn ext_types(&self) -> &ExtTypes {
            &self.ext
        }

        fn bind(&self, handle: RemoteHandle) -> BoundHandle<'_> {
            BoundHandle {
                handle,
                owner: self,
            }
        }
    }

    #[test]
    fn pack_unpack_each_kind() {
        let ext = ExtTypes::default();
        for kind in HandleKind::ALL {
            let handle = RemoteHandle::new(kind, 1001);
            let packed = ext.pack(handle);
            assert!(matches!(packed, Value::Ext(tag, _) if tag == kind.default_tag()));
            assert_eq!(ext.unpack(&packed).unwrap(), handle);
        }
    }

    #[test]
    fn custom_tags_are_honoured() {
        let ext = ExtTypes::new(5, 6, 7);
        let packed = ext.pack(RemoteHandle::window(3));
        assert!(matches!(packed, Value::Ext(6, _)));
        assert_eq!(ext.kind_for_tag(7), Some(HandleKind::Tabpage));
        assert_eq!(ext.kind_for_tag(0), None);
    }

    #[test]
    fn unknown_tag_is_protocol_error() {
        let ext = ExtTypes::default();
        let err = ext.unpack(&Value::Ext(42, vec![0x01])).unwrap_err();
        assert!(matches!(err, CodecError::UnknownExtension(42)));
    }

    #[test]
    fn non_ext_is_rejected() {
        let ext = ExtTypes::default();
        assert!(matches!(
            ext.unpack(&Value::from(3)),
            Err(CodecError::NotAHandle(_))
        ));
        assert!(ext.try_unpack(&Value::Nil).is_none());
    }

    #[test]
    fn large_and_negative_ids_survive() {
        let ext = ExtTypes::default();
        for id in [0, -1, 127, 128, 65_536, i64::from(u32::MAX) + 1] {
            let handle = RemoteHandle::buffer(id);
            assert_eq!(ext.unpack(&ext.pack(handle)).unwrap(), handle);
        }
    }

    #[test]
    fn flatten_replaces_nested_handles() {
        let ext = ExtTypes::default();
        let value = Value::Array(vec![
            ext.pack(RemoteHandle::buffer(4)),
            Value::Map(vec![(Value::from("win"), ext.pack(RemoteHandle::window(1000)))]),
            Value::from("text"),
        ]);
        let flat = ext.flatten(&value);
        assert_eq!(
            flat,
            Value::Array(vec![
                Value::from(4),
                Value::Map(vec![(Value::from("win"), Value::from(1000))]),
                Value::from("text"),
            ])
        );
    }

    #[test]
    fn wrap_id_requires_integer() {
        let ext = ExtTypes::default();
        let wrapped = ext.wrap_id(HandleKind::Tabpage, &Value::from(2)).unwrap();
        assert_eq!(ext.unpack(&wrapped).unwrap(), RemoteHandle::tabpage(2));
        assert!(ext.wrap_id(HandleKind::Tabpage, &Value::from("2")).is_none());
    }

    #[test]
    fn decode_handle_binds_to_context() {
        let ctx = Recorder {
            ext: ExtTypes::default(),
            name: "client-a",
        };
        let value = ctx.ext.pack(RemoteHandle::buffer(9));
        let bound = decode_handle(&value, &ctx).unwrap();
        assert_eq!(bound.handle, RemoteHandle::buffer(9));
        assert_eq!(bound.owner.name, "client-a");
    }
}
