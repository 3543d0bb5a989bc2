//! `ping` and `users.list` (spec §4.5, §4.6).

use serde_json::{Map, Value, json};

use crate::Server;
use crate::error::DispatchError;

pub fn ping(_server: &Server, _session_id: &str, _payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    Ok(json!({ "pong": true, "time": chrono::Utc::now().to_rfc3339() }))
}

pub fn users_list(server: &Server, _session_id: &str, _payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    let users: Vec<Value> = server
        .sessions
        .list_online()
        .into_iter()
        .map(|u| json!({ "name": u.name, "connected_at": u.connected_at, "rooms": u.rooms }))
        .collect();
    Ok(json!({ "users": users }))
}
