//! Direct messages: both the `action: "dm"` request/response path and the
//! `type: "chat"` path with a plain-name `to` (spec §4.5).

use serde_json::{Map, Value, json};

use crate::Server;
use crate::error::DispatchError;
use crate::protocol::Envelope;

/// Build and deliver a DM chat envelope to `to_name`. Returns the envelope
/// that was sent, so callers can echo it back to the sender when the
/// delivery came in over the raw `chat` path (spec §4.5, §9 Open Question 2).
pub fn deliver(server: &Server, sender_id: &str, to_name: &str, message: &str) -> Result<Envelope, DispatchError> {
    let recipient_id = server
        .sessions
        .get_by_name(to_name)
        .ok_or_else(|| DispatchError::RecipientOffline(to_name.to_string()))?;
    let recipient = server
        .sessions
        .get_by_id(&recipient_id)
        .ok_or_else(|| DispatchError::RecipientOffline(to_name.to_string()))?;

    let sender_name = server.sessions.name_of(sender_id).unwrap_or_else(|| sender_id.to_string());
    let mut payload = Map::new();
    payload.insert("message".to_string(), Value::String(message.to_string()));
    payload.insert("dm".to_string(), Value::Bool(true));
    let envelope = Envelope::chat(&sender_name, Some(to_name.to_string()), payload);

    recipient.send(&envelope);
    crate::metrics::DM_DELIVERED_TOTAL.inc();
    Ok(envelope)
}

pub fn send(server: &Server, session_id: &str, payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    let to = payload
        .get("to")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("to"))?;
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("message"))?;

    deliver(server, session_id, to, message)?;
    Ok(json!({ "to": to, "delivered": true }))
}
