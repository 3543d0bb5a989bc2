//! `room.create` / `room.join` / `room.leave` / `room.list` / `room.members`
//! (spec §4.5).

use serde_json::{Map, Value, json};

use crate::Server;
use crate::error::DispatchError;

fn session_name(server: &Server, session_id: &str) -> String {
    server
        .sessions
        .name_of(session_id)
        .unwrap_or_else(|| session_id.to_string())
}

pub fn create(server: &Server, session_id: &str, payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    let name = payload.get("name").and_then(Value::as_str).map(String::from);
    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .map(String::from);
    let persistent = payload.get("persistent").and_then(Value::as_bool).unwrap_or(false);
    let password = payload
        .get("password")
        .and_then(Value::as_str)
        .map(String::from);

    // `created_by` is keyed the same way `member_roles` is everywhere else
    // (session id, not display name) so the creator's OWNER assignment
    // survives into their first `room.join` (spec §3 "the room creator's
    // role is always OWNER at creation time").
    server.rooms.create_room(
        room_id,
        session_id,
        name.clone(),
        description.clone(),
        persistent,
        password.clone(),
    )?;

    Ok(json!({
        "room_id": room_id,
        "name": name.unwrap_or_else(|| room_id.to_string()),
        "description": description.unwrap_or_default(),
        "persistent": persistent,
        "has_password": password.is_some(),
    }))
}

pub fn join(server: &Server, session_id: &str, payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    let password = payload.get("password").and_then(Value::as_str);

    let name = session_name(server, session_id);
    server
        .rooms
        .join_room(&server.sessions, room_id, session_id, &name, password)?;

    let members: Vec<String> = server
        .rooms
        .get_members(room_id)?
        .into_iter()
        .filter_map(|m| server.sessions.name_of(&m.session_id))
        .collect();

    Ok(json!({ "room_id": room_id, "members": members }))
}

pub fn leave(server: &Server, session_id: &str, payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    let name = session_name(server, session_id);
    server.rooms.leave_room(&server.sessions, room_id, session_id, &name)?;
    Ok(json!({ "room_id": room_id }))
}

pub fn list(server: &Server, session_id: &str, _payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    Ok(json!({ "rooms": server.rooms.list_rooms(Some(session_id)) }))
}

pub fn members(server: &Server, _session_id: &str, payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    let members: Vec<Value> = server
        .rooms
        .get_members(room_id)?
        .into_iter()
        .map(|m| {
            json!({
                "name": server.sessions.name_of(&m.session_id).unwrap_or(m.session_id),
                "role": m.role,
            })
        })
        .collect();
    Ok(json!({ "room_id": room_id, "members": members }))
}
