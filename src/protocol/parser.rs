//! JSON Frame Codec
//!
//! Turns inbound frame payloads into [`Command`]s and [`Response`]s into
//! outbound payloads. The connection handler decides what to do with a frame
//! that fails to decode.
//!
//! ## Decoding Rules
//!
//! - The frame and every parameter pair must be JSON objects.
//! - Field names match case-insensitively (`"Action"` reads as `action`).
//! - A `null` field reads as if it were absent; a `null` pair is an empty pair.
//! - Unknown fields are ignored. Wrongly typed known fields reject the frame.

use crate::protocol::types::{Command, Response};
use serde_json::{Map, Value};
use thiserror::Error;

const COMMAND_FIELDS: &[&str] = &["action", "parameters"];
const PARAMETER_FIELDS: &[&str] = &["key", "value"];

/// Errors that can occur while decoding or encoding a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload is not valid JSON or a field has the wrong type
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload or a parameter is valid JSON but not an object
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Result type for codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Decodes one frame payload into a command.
///
/// # Example
///
/// ```
/// use keyreg::protocol::decode_command;
///
/// let cmd = decode_command(br#"{"action":"count","parameters":[]}"#).unwrap();
/// assert_eq!(cmd.action, "count");
///
/// assert!(decode_command(br#"["count"]"#).is_err());
/// ```
pub fn decode_command(payload: &[u8]) -> ProtocolResult<Command> {
    let frame: Value = serde_json::from_slice(payload)?;
    let mut fields = known_fields(frame, COMMAND_FIELDS)?;

    if let Some(Value::Array(pairs)) = fields.get_mut("parameters") {
        for pair in pairs.iter_mut() {
            let raw = std::mem::take(pair);
            *pair = Value::Object(known_fields(raw, PARAMETER_FIELDS)?);
        }
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Encodes a response into its JSON text form.
pub fn encode_response(response: &Response) -> ProtocolResult<String> {
    Ok(serde_json::to_string(response)?)
}

/// Keeps the non-null entries of an object whose names fold to one of
/// `names`, rewritten to the canonical name.
fn known_fields(value: Value, names: &[&str]) -> ProtocolResult<Map<String, Value>> {
    let object = match value {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        other => return Err(ProtocolError::NotAnObject(json_kind(&other))),
    };

    Ok(object
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .filter_map(|(name, v)| {
            names
                .iter()
                .find(|known| known.eq_ignore_ascii_case(&name))
                .map(|known| (known.to_string(), v))
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
