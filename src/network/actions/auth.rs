//! `action: "auth"` (spec §4.5).

use serde_json::{Value, json};

use crate::Server;
use crate::error::DispatchError;

pub fn handle(
    server: &Server,
    session_id: &str,
    payload: &serde_json::Map<String, Value>,
) -> Result<Value, DispatchError> {
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("name"))?;
    let token = payload.get("token").and_then(Value::as_str);

    let outcome = server.sessions.authenticate(session_id, name, token)?;
    let rooms = server
        .sessions
        .get_by_id(session_id)
        .map(|s| s.rooms.iter().cloned().collect::<Vec<_>>())
        .unwrap_or_default();

    Ok(json!({
        "user_id": session_id,
        "name": name.trim(),
        "token": outcome.token,
        "reconnected": outcome.reconnected,
        "restored_rooms": outcome.restored_rooms,
        "rooms": rooms,
    }))
}
