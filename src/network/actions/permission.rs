//! `permission.*` actions (spec §4.5).

use serde_json::{Map, Value, json};

use crate::Server;
use crate::error::{DispatchError, RoomError};
use crate::protocol::{MessagePermission, Role, Visibility};

pub fn set_role(server: &Server, session_id: &str, payload: &Map<String, Value>) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    let user_name = payload
        .get("user_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("user_id"))?;
    let role_str = payload
        .get("role")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("role"))?;
    let new_role = Role::parse(role_str).ok_or_else(|| RoomError::InvalidRole(role_str.to_string()))?;

    let target_id = server
        .sessions
        .get_by_name(user_name)
        .ok_or_else(|| RoomError::TargetNotMember(user_name.to_string()))?;
    let old_role = server.rooms.get_user_role(room_id, &target_id);

    server.rooms.set_user_role(room_id, session_id, &target_id, new_role)?;

    if let Some(old_role) = old_role {
        let envelope = crate::protocol::Envelope::system(
            "user.role_changed",
            Some(crate::protocol::room_target(room_id)),
            object(json!({
                "room_id": room_id,
                "user_id": target_id,
                "user_name": user_name,
                "old_role": old_role,
                "new_role": new_role,
            })),
        );
        for member in server.rooms.get_members(room_id).unwrap_or_default() {
            if let Some(session) = server.sessions.get_by_id(&member.session_id) {
                session.send(&envelope);
            }
        }
    }

    // Spec §4.5's action table gives this one response's `data` shape in
    // camelCase (`{userId, oldRole, newRole}`), unlike the rest of the table.
    Ok(json!({ "userId": user_name, "oldRole": old_role, "newRole": new_role }))
}

pub fn get_my_permissions(
    server: &Server,
    session_id: &str,
    payload: &Map<String, Value>,
) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    if !server.rooms.is_member(room_id, session_id) {
        return Err(RoomError::NotMember.into());
    }
    let role = server.rooms.get_user_role(room_id, session_id).unwrap_or(Role::Guest);
    let permissions = server
        .rooms
        .get_room_permissions(room_id)
        .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;

    Ok(json!({
        "user_id": session_id,
        "room_id": room_id,
        "role": role,
        "permissions": permissions,
    }))
}

pub fn get_room_config(
    server: &Server,
    _session_id: &str,
    payload: &Map<String, Value>,
) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    let permissions = server
        .rooms
        .get_room_permissions(room_id)
        .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
    let config = server
        .rooms
        .get_room_config(room_id)
        .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;

    Ok(json!({ "room_id": room_id, "permissions": permissions, "config": config }))
}

pub fn send_restricted(
    server: &Server,
    session_id: &str,
    payload: &Map<String, Value>,
) -> Result<Value, DispatchError> {
    let room_id = payload
        .get("room_id")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("room_id"))?;
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .ok_or(DispatchError::MissingField("message"))?;
    let visibility_str = payload
        .get("visibility")
        .and_then(Value::as_str)
        .unwrap_or("private");
    let visibility = match visibility_str {
        "public" => Visibility::Public,
        "role_based" => Visibility::RoleBased,
        "user_based" => Visibility::UserBased,
        _ => Visibility::Private,
    };

    let allowed_roles: Vec<Role> = payload
        .get("allowed_roles")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).filter_map(Role::parse).collect())
        .unwrap_or_default();

    // Human-readable names are resolved to session ids here; `canViewMessage`
    // operates purely on session ids (see MessagePermission's doc comment).
    let resolve_names = |key: &str| -> Vec<String> {
        payload
            .get(key)
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|name| server.sessions.get_by_name(name))
                    .collect()
            })
            .unwrap_or_default()
    };
    let allowed_users = resolve_names("allowed_users");
    let denied_users = resolve_names("denied_users");

    let expires_at = payload
        .get("expires_in")
        .and_then(Value::as_i64)
        .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs));

    let permission = MessagePermission {
        visibility,
        allowed_roles,
        allowed_users,
        denied_users,
        expires_at,
    };

    let sender_name = server
        .sessions
        .name_of(session_id)
        .unwrap_or_else(|| session_id.to_string());
    server
        .rooms
        .broadcast_chat(&server.sessions, room_id, session_id, &sender_name, message, Some(permission))?;

    Ok(json!({ "room_id": room_id }))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("object() is only ever called with object literals"),
    }
}
