use rmpv::Value;

use crate::error::MessageError;

/// Top-level type tag of a request.
pub const REQUEST: i64 = 0;
/// Top-level type tag of a response.
pub const RESPONSE: i64 = 1;
/// Top-level type tag of a notification.
pub const NOTIFICATION: i64 = 2;

/// A msgpack-RPC message.
///
/// Wire shapes:
/// ```text
/// [0, id, method, args]      request
/// [1, id, error, result]     response (exactly one of error/result non-nil)
/// [2, method, args]          notification
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: i64,
        method: String,
        args: Vec<Value>,
    },
    /// `Err` carries the host's error value and must not be nil.
    Response {
        id: i64,
        result: Result<Value, Value>,
    },
    Notification {
        method: String,
        args: Vec<Value>,
    },
}

impl Message {
    pub fn request(id: i64, method: impl Into<String>, args: Vec<Value>) -> Self {
        Message::Request {
            id,
            method: method.into(),
            args,
        }
    }

    pub fn notification(method: impl Into<String>, args: Vec<Value>) -> Self {
        Message::Notification {
            method: method.into(),
            args,
        }
    }

    pub fn response(id: i64, result: Result<Value, Value>) -> Self {
        Message::Response { id, result }
    }

    /// Short name for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Message::Request { .. } => "request",
            Message::Response { .. } => "response",
            Message::Notification { .. } => "notification",
        }
    }

    /// Array-encoded wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Message::Request { id, method, args } => Value::Array(vec![
                Value::from(REQUEST),
                Value::from(*id),
                Value::from(method.as_str()),
                Value::Array(args.clone()),
            ]),
            Message::Response { id, result } => {
                let (error, result) = match result {
                    Ok(value) => (Value::Nil, value.clone()),
                    Err(error) => (error.clone(), Value::Nil),
                };
                Value::Array(vec![Value::from(RESPONSE), Value::from(*id), error, result])
            }
            Message::Notification { method, args } => Value::Array(vec![
                Value::from(NOTIFICATION),
                Value::from(method.as_str()),
                Value::Array(args.clone()),
            ]),
        }
    }

    /// Interpret a decoded msgpack value as a message.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Array(items) = value else {
            return Err(MessageError::Malformed(format!(
                "expected array, got {value}"
            )));
        };
        let tag = items
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| MessageError::Malformed("missing message type".to_string()))?;

        let mut fields = items.into_iter().skip(1);
        match tag {
            REQUEST => {
                let id = match fields.next() {
                    Some(id) => expect_id(&id)?,
                    None => return Err(MessageError::Malformed("request needs 4 fields".into())),
                };
                let invalid = move |err: MessageError| MessageError::InvalidRequest {
                    id,
                    reason: match err {
                        MessageError::Malformed(reason) => reason,
                        other => other.to_string(),
                    },
                };
                let (method, args) = match (fields.next(), fields.next()) {
                    (Some(method), Some(args)) => (method, args),
                    _ => {
                        return Err(invalid(MessageError::Malformed(
                            "request needs 4 fields".into(),
                        )))
                    }
                };
                Ok(Message::Request {
                    id,
                    method: expect_method(method).map_err(invalid)?,
                    args: expect_args(args).map_err(invalid)?,
                })
            }
            RESPONSE => {
                let (id, error, result) = match (fields.next(), fields.next(), fields.next()) {
                    (Some(id), Some(error), Some(result)) => (id, error, result),
                    _ => return Err(MessageError::Malformed("response needs 4 fields".into())),
                };
                let result = if error.is_nil() { Ok(result) } else { Err(error) };
                Ok(Message::Response {
                    id: expect_id(&id)?,
                    result,
                })
            }
            NOTIFICATION => {
                let (method, args) = match (fields.next(), fields.next()) {
                    (Some(method), Some(args)) => (method, args),
                    _ => {
                        return Err(MessageError::Malformed(
                            "notification needs 3 fields".into(),
                        ))
                    }
                };
                Ok(Message::Notification {
                    method: expect_method(method)?,
                    args: expect_args(args)?,
                })
            }
            other => Err(MessageError::UnknownType(other)),
        }
    }
}

fn expect_id(value: &Value) -> Result<i64, MessageError> {
    value
        .as_i64()
        .ok_or_else(|| MessageError::Malformed(format!("invalid message id {value}")))
}

fn expect_method(value: Value) -> Result<String, MessageError> {
    match value {
        Value::String(s) => s
            .into_str()
            .ok_or_else(|| MessageError::Malformed("method name is not utf-8".to_string())),
        Value::Binary(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        other => Err(MessageError::Malformed(format!(
            "invalid method name {other}"
        ))),
    }
}

fn expect_args(value: Value) -> Result<Vec<Value>, MessageError> {
    match value {
        Value::Array(args) => Ok(args),
        Value::Nil => Ok(Vec::new()),
        other => Err(MessageError::Malformed(format!(
            "arguments must be an array, got {other}"
        ))),
    }
}
