// src/payload.rs

//! Workitem payload codec.
//!
//! A payload is a JSON object (string keys, JSON values). The queue service
//! stores it as a string; [`decode`] and [`encode`] convert between the two
//! and satisfy `decode(&encode(&d)?)? == d` for every decoded `d`.

use serde_json::{Map, Value};

use crate::errors::{Result, WorkerError};

/// Decoded workitem payload.
pub type Payload = Map<String, Value>;

/// Parse a raw payload string.
///
/// An empty (or all-whitespace) string decodes to an empty payload, since
/// the queue service creates workitems without a payload that way. Anything
/// that is not a JSON object is rejected as `MalformedPayload`.
pub fn decode(raw: &str) -> Result<Payload> {
    if raw.trim().is_empty() {
        return Ok(Payload::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(WorkerError::MalformedPayload(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
        Err(e) => Err(WorkerError::MalformedPayload(e.to_string())),
    }
}

/// Serialize a payload back to its string form.
pub fn encode(payload: &Payload) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| WorkerError::MalformedPayload(e.to_string()))
}

/// Read a recognized string field.
///
/// A missing field is `None`; a field of any other JSON type is rejected as
/// `MalformedPayload`.
pub fn string_field<'a>(payload: &'a Payload, key: &str) -> Result<Option<&'a str>> {
    match payload.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(WorkerError::MalformedPayload(format!(
            "{key} must be a string, got {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
