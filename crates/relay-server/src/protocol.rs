//! JSON wire format for frames exchanged over `/ws`.
//!
//! Inbound frames are objects tagged by `type`. Payloads are captured as raw
//! JSON spans and written back out untouched.

use relay_core::{FrameError, GroupId, InboundEvent, OutboundEvent, Payload, UserId};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    group_id: Option<Value>,
    recipient_id: Option<Value>,
    #[serde(default, deserialize_with = "present_raw")]
    payload: Option<Box<RawValue>>,
}

/// A present key always yields `Some`, including an explicit `null`.
fn present_raw<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Outbound delivery frame.
#[derive(Debug, Serialize)]
struct DeliveryFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a RawValue,
}

/// Error acknowledgement sent to the originating connection only.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub message: String,
}

impl ErrorFrame {
    pub fn from_error(err: &FrameError) -> Self {
        Self {
            kind: "error".into(),
            code: err.code().into(),
            message: err.to_string(),
        }
    }
}

/// Parse one inbound text frame into a routed event.
pub fn decode_frame(text: &str) -> Result<InboundEvent, FrameError> {
    if !text.trim_start().starts_with('{') {
        return Err(FrameError::Malformed("expected a JSON object".into()));
    }
    let frame: InboundFrame =
        serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;

    let kind = frame.kind.ok_or(FrameError::MissingField("type"))?;
    match kind.as_str() {
        "joinGroup" => Ok(InboundEvent::JoinGroup {
            group_id: GroupId::from_raw(require_id(frame.group_id, "groupId")?),
        }),
        "sendDirectMessage" => Ok(InboundEvent::SendDirectMessage {
            recipient_id: UserId::from_raw(require_id(frame.recipient_id, "recipientId")?),
            payload: frame.payload.ok_or(FrameError::MissingField("payload"))?,
        }),
        "sendGroupMessage" => Ok(InboundEvent::SendGroupMessage {
            group_id: GroupId::from_raw(require_id(frame.group_id, "groupId")?),
            payload: frame.payload.ok_or(FrameError::MissingField("payload"))?,
        }),
        _ => Err(FrameError::UnknownEvent(kind)),
    }
}

/// Ids arrive as strings or integers; both map to the same string key, so
/// `"userId=2"` on the handshake matches `"recipientId": 2` in a frame.
fn require_id(value: Option<Value>, field: &'static str) -> Result<String, FrameError> {
    match value {
        None | Some(Value::Null) => Err(FrameError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(FrameError::InvalidField {
            field,
            reason: "must not be empty".into(),
        }),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(other) => Err(FrameError::InvalidField {
            field,
            reason: format!("expected string or integer, got {}", type_name(&other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Serialize a delivery frame. The payload bytes are embedded verbatim.
pub fn encode_delivery(event: OutboundEvent, payload: &Payload) -> Result<String, serde_json::Error> {
    serde_json::to_string(&DeliveryFrame {
        kind: event.as_str(),
        payload,
    })
}

/// Serialize an error acknowledgement.
pub fn encode_error(err: &FrameError) -> String {
    serde_json::to_string(&ErrorFrame::from_error(err)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize error frame");
        String::new()
    })
}
