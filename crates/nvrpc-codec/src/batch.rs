//! Wire shape of the host's atomic batch call.

use rmpv::Value;

use crate::error::MessageError;

/// Method that executes a list of calls in one round trip.
pub const CALL_ATOMIC: &str = "nvim_call_atomic";

/// Build the single argument of [`CALL_ATOMIC`]: `[[method, args], ...]`.
pub fn call_list(calls: &[(String, Vec<Value>)]) -> Value {
    Value::Array(
        calls
            .iter()
            .map(|(method, args)| {
                Value::Array(vec![Value::from(method.as_str()), Value::Array(args.clone())])
            })
            .collect(),
    )
}

/// The call inside a batch that failed; later calls were not executed.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicError {
    pub index: usize,
    pub kind: i64,
    pub message: String,
}

/// Result of an atomic batch: `[results, error_or_nil]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicResult {
    pub results: Vec<Value>,
    pub error: Option<AtomicError>,
}

impl AtomicResult {
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Array(items) = value else {
            return Err(MessageError::Malformed(format!(
                "atomic result must be an array, got {value}"
            )));
        };
        let mut items = items.into_iter();
        let results = match items.next() {
            Some(Value::Array(results)) => results,
            Some(Value::Nil) | None => Vec::new(),
            Some(other) => {
                return Err(MessageError::Malformed(format!(
                    "atomic results must be an array, got {other}"
                )))
            }
        };
        let error = match items.next() {
            None | Some(Value::Nil) => None,
            Some(Value::Array(parts)) => Some(parse_error(&parts)?),
            Some(other) => {
                return Err(MessageError::Malformed(format!(
                    "atomic error must be [index, type, message], got {other}"
                )))
            }
        };
        Ok(Self { results, error })
    }
}

fn parse_error(parts: &[Value]) -> Result<AtomicError, MessageError> {
    let index = parts
        .first()
        .and_then(Value::as_u64)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| MessageError::Malformed("atomic error without index".to_string()))?;
    let kind = parts.get(1).and_then(Value::as_i64).unwrap_or(0);
    let message = match parts.get(2) {
        Some(Value::String(s)) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        Some(Value::Binary(b)) => String::from_utf8_lossy(b).into_owned(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Ok(AtomicError {
        index,
        kind,
        message,
    })
}
