//! The single wire message schema used by every connection (spec §3, §4.1).
//!
//! Every frame — chat, system event, client action, server response, or
//! error — is one `Envelope`. `parse` backfills the four fields callers are
//! allowed to omit (`id`, `from`, `timestamp`, `payload`) so downstream
//! handlers never have to special-case a missing value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// The kind of envelope being carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    Chat,
    System,
    Action,
    Response,
    Error,
}

/// The uniform JSON object used for all wire messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "generate_id")]
    pub id: String,

    #[serde(rename = "type")]
    pub kind: EnvelopeType,

    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub payload: Map<String, Value>,
}

fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn default_from() -> String {
    "unknown".to_string()
}

/// Build a `to` value addressing a room (§3: `"room:<id>"`).
pub fn room_target(room_id: &str) -> String {
    format!("room:{room_id}")
}

/// Split a `to` value into a room id, if it addresses a room.
pub fn room_id_from_target(to: &str) -> Option<&str> {
    to.strip_prefix("room:")
}

impl Envelope {
    /// Parse a wire frame. Returns `None` on non-JSON, a missing/invalid
    /// `type`, or any shape that isn't a JSON object (spec §4.1).
    pub fn parse(bytes: &[u8]) -> Option<Envelope> {
        serde_json::from_slice(bytes).ok()
    }

    /// Serialize this envelope back to wire bytes. Any value the server
    /// constructs round-trips through this unchanged.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("Envelope serializes infallibly")
    }

    /// The first frame sent on every new connection (§6 "Welcome envelope").
    pub fn welcome(session_id: &str) -> Envelope {
        Envelope {
            id: generate_id(),
            kind: EnvelopeType::System,
            from: "server".to_string(),
            to: None,
            timestamp: Utc::now(),
            payload: map(json!({
                "event": "welcome",
                "message": "Welcome! Send an 'action' with your name to authenticate.",
                "user_id": session_id,
            })),
        }
    }

    /// A server-originated system event, e.g. `user.joined`, `user.left`.
    pub fn system(event: &str, to: Option<String>, mut extra: Map<String, Value>) -> Envelope {
        extra.insert("event".to_string(), Value::String(event.to_string()));
        Envelope {
            id: generate_id(),
            kind: EnvelopeType::System,
            from: "server".to_string(),
            to,
            timestamp: Utc::now(),
            payload: extra,
        }
    }

    /// A chat message, either a room broadcast or a direct message.
    pub fn chat(from: &str, to: Option<String>, payload: Map<String, Value>) -> Envelope {
        Envelope {
            id: generate_id(),
            kind: EnvelopeType::Chat,
            from: from.to_string(),
            to,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// A response to a client `action`, success or failure (§7).
    pub fn response(
        action: &str,
        success: bool,
        data: Option<Value>,
        error: Option<String>,
    ) -> Envelope {
        let mut payload = Map::new();
        payload.insert("action".to_string(), Value::String(action.to_string()));
        payload.insert("success".to_string(), Value::Bool(success));
        if let Some(data) = data {
            payload.insert("data".to_string(), data);
        }
        if let Some(error) = error {
            payload.insert("error".to_string(), Value::String(error));
        }
        Envelope {
            id: generate_id(),
            kind: EnvelopeType::Response,
            from: "server".to_string(),
            to: None,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// A standalone error envelope (§6). Never broadcast.
    pub fn error(code: u16, message: impl Into<String>) -> Envelope {
        Envelope {
            id: generate_id(),
            kind: EnvelopeType::Error,
            from: "server".to_string(),
            to: None,
            timestamp: Utc::now(),
            payload: map(json!({
                "code": code,
                "message": message.into(),
            })),
        }
    }

    /// A client-originated action envelope, mostly useful in tests.
    pub fn action(from: &str, action: &str, mut extra: Map<String, Value>) -> Envelope {
        extra.insert("action".to_string(), Value::String(action.to_string()));
        Envelope {
            id: generate_id(),
            kind: EnvelopeType::Action,
            from: from.to_string(),
            to: None,
            timestamp: Utc::now(),
            payload: extra,
        }
    }
}

fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("map() is only ever called with object literals"),
    }
}
