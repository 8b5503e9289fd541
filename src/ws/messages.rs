//! WebSocket wire format: inbound frame decoding and outbound messages.
//!
//! Inbound frames are JSON objects of the form
//! `{"type": "...", "event_type": "...", "data": {...}, "timestamp": "..."}`.
//! Either tag field may be missing; the backend usually sends both, with a
//! lowercase `type` and an uppercase `event_type`.

use serde::Serialize;
use serde_json::Value;

use crate::domain::{Event, EventType};
use crate::error::DecodeError;

/// Messages this client sends on its own behalf.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive; the backend answers with a `PONG` event.
    Ping,
}

/// Decodes one text frame into an [`Event`].
///
/// Tag resolution: a recognised `type` wins, then a recognised `event_type`;
/// if neither is recognised, whichever non-empty string tag is present
/// becomes [`EventType::Custom`] (`type` first).
///
/// # Errors
///
/// Returns a [`DecodeError`] if the frame is not JSON, not an object, has no
/// string tag, or a known type carries a non-object payload.
pub fn decode_frame(text: &str) -> Result<Event, DecodeError> {
    let frame: Value = serde_json::from_str(text)?;
    let Some(object) = frame.as_object() else {
        return Err(DecodeError::NotAnObject);
    };

    let tag = |field: &str| {
        object
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    };
    let type_tag = tag("type");
    let event_type_tag = tag("event_type");

    let event_type = type_tag
        .and_then(EventType::known)
        .or_else(|| event_type_tag.and_then(EventType::known))
        .or_else(|| type_tag.or(event_type_tag).map(EventType::from_tag))
        .ok_or(DecodeError::MissingType)?;

    let data = object
        .get("data")
        .or_else(|| object.get("payload"))
        .cloned()
        .unwrap_or(Value::Null);

    if event_type.requires_object_payload() && !(data.is_object() || data.is_null()) {
        return Err(DecodeError::PayloadShape {
            event_type: event_type.to_string(),
            found: json_kind(&data),
        });
    }

    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Event::new(event_type, data, timestamp, frame))
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
