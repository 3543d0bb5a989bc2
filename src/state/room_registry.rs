//! Room Registry (spec §4.4): room lifecycle, membership, and the
//! permission-gated broadcast fan-out.

use dashmap::DashMap;
use serde_json::{Map, Value, json};

use crate::error::RoomError;
use crate::metrics;
use crate::protocol::{
    Action, Envelope, MessagePermission, Role, RoomConfig, RoomPermissions, Visibility,
    can_change_role, can_perform_action, can_view_message, room_target,
};

use super::room::{JOIN_HISTORY_PREVIEW, Room};
use super::session::SessionId;
use super::session_registry::SessionRegistry;

/// A member entry as seen from the outside (HTTP views, `room.members`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemberView {
    pub session_id: SessionId,
    pub role: Role,
}

/// A room summary as seen from the outside (`room.list`, `GET /rooms`).
/// Never leaks the password itself — only whether one is set (spec §4.4).
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub persistent: bool,
    pub has_password: bool,
    pub member_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_role: Option<Role>,
}

pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
}

/// `room_id` must be non-empty and match `^[a-zA-Z0-9_-]+$` (spec §4.4).
fn validate_room_id(room_id: &str) -> Result<(), RoomError> {
    if room_id.is_empty() {
        return Err(RoomError::MissingRoomId);
    }
    let valid = room_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(RoomError::InvalidRoomId(room_id.to_string()));
    }
    Ok(())
}

impl RoomRegistry {
    /// Seed the two always-present persistent rooms (spec §3 Glossary).
    pub fn new() -> Self {
        let rooms = DashMap::new();
        rooms.insert(
            "general".to_string(),
            Room::new(
                "general".to_string(),
                "server".to_string(),
                Some("General".to_string()),
                Some("Default room for everyone".to_string()),
                true,
                None,
            ),
        );
        rooms.insert(
            "random".to_string(),
            Room::new(
                "random".to_string(),
                "server".to_string(),
                Some("Random".to_string()),
                Some("Off-topic chatter".to_string()),
                true,
                None,
            ),
        );
        metrics::ROOMS_ACTIVE.set(2);
        Self { rooms }
    }

    pub fn create_room(
        &self,
        room_id: &str,
        created_by: &str,
        name: Option<String>,
        description: Option<String>,
        persistent: bool,
        password: Option<String>,
    ) -> Result<(), RoomError> {
        validate_room_id(room_id)?;
        if self.rooms.contains_key(room_id) {
            return Err(RoomError::DuplicateRoomId(room_id.to_string()));
        }
        self.rooms.insert(
            room_id.to_string(),
            Room::new(
                room_id.to_string(),
                created_by.to_string(),
                name,
                description,
                persistent,
                password,
            ),
        );
        metrics::ROOMS_ACTIVE.inc();
        Ok(())
    }

    /// Join `session_id` (displayed as `user_name`) into `room_id`.
    /// Idempotent: joining a room you're already in is a no-op beyond
    /// re-sending the welcome history. Sends `user.joined` to the room and
    /// `room.history` to the joining session.
    pub fn join_room(
        &self,
        sessions: &SessionRegistry,
        room_id: &str,
        session_id: &str,
        user_name: &str,
        password: Option<&str>,
    ) -> Result<(), RoomError> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;

        let already_member = room.members.contains(session_id);
        if !already_member {
            if let Some(expected) = room.password.as_deref() {
                match password {
                    Some(given) if given == expected => {}
                    Some(_) => return Err(RoomError::WrongPassword),
                    None => return Err(RoomError::PasswordRequired),
                }
            }
            room.members.insert(session_id.to_string());
            room.member_roles
                .entry(session_id.to_string())
                .or_insert(room.config.default_role);
        }

        let history: Vec<Value> = room
            .history
            .tail(JOIN_HISTORY_PREVIEW)
            .into_iter()
            .map(|e| serde_json::to_value(e).expect("envelope serializes infallibly"))
            .collect();

        if !already_member {
            let joined_envelope = Envelope::system(
                "user.joined",
                Some(room_target(room_id)),
                map(json!({ "room_id": room_id, "user": user_name })),
            );
            for member_id in room.members.iter().filter(|id| id.as_str() != session_id) {
                if let Some(session) = sessions.get_by_id(member_id) {
                    session.send(&joined_envelope);
                }
            }
        }

        if let Some(session) = sessions.get_by_id(session_id) {
            let history_envelope = Envelope::system(
                "room.history",
                None,
                map(json!({ "room_id": room_id, "history": history })),
            );
            session.send(&history_envelope);
        }

        drop(room);
        sessions.join_room(session_id, room_id);
        Ok(())
    }

    /// Remove `session_id` from `room_id`. Non-persistent rooms with no
    /// remaining members are destroyed (spec §4.4).
    pub fn leave_room(
        &self,
        sessions: &SessionRegistry,
        room_id: &str,
        session_id: &str,
        user_name: &str,
    ) -> Result<(), RoomError> {
        let destroy = {
            let mut room = self
                .rooms
                .get_mut(room_id)
                .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
            if !room.members.remove(session_id) {
                return Err(RoomError::NotMember);
            }
            room.member_roles.remove(session_id);

            let left_envelope = Envelope::system(
                "user.left",
                Some(room_target(room_id)),
                map(json!({ "room_id": room_id, "user": user_name })),
            );
            for member_id in room.members.iter() {
                if let Some(session) = sessions.get_by_id(member_id) {
                    session.send(&left_envelope);
                }
            }

            room.members.is_empty() && !room.persistent
        };

        sessions.leave_room(session_id, room_id);
        if destroy {
            self.rooms.remove(room_id);
            metrics::ROOMS_ACTIVE.dec();
        }
        Ok(())
    }

    /// Remove a disconnecting session from every room it was a member of.
    pub fn remove_user_from_all(&self, sessions: &SessionRegistry, session_id: &str, user_name: &str) {
        let room_ids: Vec<String> = self
            .rooms
            .iter()
            .filter(|r| r.members.contains(session_id))
            .map(|r| r.id.clone())
            .collect();
        for room_id in room_ids {
            let _ = self.leave_room(sessions, &room_id, session_id, user_name);
        }
    }

    /// Broadcast a chat message into `room_id`, gated by `SendMessage` (and
    /// `SendRestrictedMessage` when `permission` is set) and filtered
    /// per-recipient by `canViewMessage` (spec §4.2, §4.4).
    #[allow(clippy::too_many_arguments)]
    pub fn broadcast_chat(
        &self,
        sessions: &SessionRegistry,
        room_id: &str,
        sender_id: &str,
        sender_name: &str,
        message: &str,
        permission: Option<MessagePermission>,
    ) -> Result<(), RoomError> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;

        if !room.members.contains(sender_id) {
            return Err(RoomError::NotMember);
        }
        let sender_role = room.role_of(sender_id).unwrap_or(Role::Guest);

        let action = if permission.is_some() {
            Action::SendRestrictedMessage
        } else {
            Action::SendMessage
        };
        if !can_perform_action(action, sender_role, &room.permissions, None) {
            return Err(RoomError::PermissionDenied);
        }

        let mut payload = Map::new();
        // Spec §4.4's exact wire shape names this field `room`, not `room_id`.
        payload.insert("room".to_string(), Value::String(room_id.to_string()));
        payload.insert("message".to_string(), Value::String(message.to_string()));
        if let Some(p) = &permission {
            payload.insert(
                "visibility".to_string(),
                serde_json::to_value(p.visibility).expect("visibility serializes"),
            );
        }
        let envelope = Envelope::chat(sender_name, Some(room_target(room_id)), payload);

        let recipients: Vec<(SessionId, Role)> = room
            .members
            .iter()
            .filter_map(|id| room.role_of(id).map(|role| (id.clone(), role)))
            .collect();
        let default_visibility = room.config.default_visibility;
        room.history.push(envelope.clone());
        drop(room);

        metrics::MESSAGES_BROADCAST_TOTAL.inc();
        for (recipient_id, recipient_role) in recipients {
            if can_view_message(
                sender_id,
                &recipient_id,
                recipient_role,
                permission.as_ref(),
                default_visibility,
            ) {
                if let Some(session) = sessions.get_by_id(&recipient_id) {
                    session.send(&envelope);
                }
            } else {
                metrics::MESSAGES_FILTERED_TOTAL.inc();
            }
        }
        Ok(())
    }

    /// Change `target_id`'s role in `room_id` (spec §4.2 `SetUserRole`).
    pub fn set_user_role(
        &self,
        room_id: &str,
        actor_id: &str,
        target_id: &str,
        new_role: Role,
    ) -> Result<(), RoomError> {
        let mut room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        let actor_role = room
            .role_of(actor_id)
            .ok_or(RoomError::NotMember)?;
        let target_current = room
            .role_of(target_id)
            .ok_or_else(|| RoomError::TargetNotMember(target_id.to_string()))?;

        if !can_perform_action(Action::SetUserRole, actor_role, &room.permissions, Some(new_role))
            || !can_change_role(actor_role, target_current, new_role)
        {
            return Err(RoomError::PermissionDenied);
        }

        room.member_roles.insert(target_id.to_string(), new_role);
        Ok(())
    }

    /// Fetch up to `count` recent history entries for `session_id`, gated by
    /// room membership and `VIEW_HISTORY`, clamped by `memberHistoryLimit`
    /// when the caller is a plain `MEMBER` (spec §4.4).
    ///
    /// Visibility filtering of restricted messages happens once, at
    /// broadcast time, against the room's membership at that moment;
    /// history reads do not re-evaluate `canViewMessage` per entry, since
    /// a room's roster (and thus a message's role-based visibility) can
    /// have changed since it was sent.
    pub fn get_history(
        &self,
        room_id: &str,
        session_id: &str,
        count: usize,
    ) -> Result<Vec<Envelope>, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        if !room.members.contains(session_id) {
            return Err(RoomError::NotMember);
        }
        let role = room.role_of(session_id).unwrap_or(Role::Guest);
        if !can_perform_action(Action::ViewHistory, role, &room.permissions, None) {
            return Err(RoomError::PermissionDenied);
        }

        let limit = room.config.member_history_limit;
        let count = if role == Role::Member && limit >= 0 {
            count.min(limit as usize)
        } else {
            count
        };
        Ok(room.history.tail(count).into_iter().cloned().collect())
    }

    pub fn get_members(&self, room_id: &str) -> Result<Vec<MemberView>, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        Ok(room
            .members
            .iter()
            .map(|id| MemberView {
                session_id: id.clone(),
                role: room.role_of(id).unwrap_or(Role::Guest),
            })
            .collect())
    }

    /// Summarize every room. When `requesting_session_id` is given, each
    /// entry is stamped with that caller's role in the room, if any (spec
    /// §4.4: "`listRooms` MAY receive a requesting user id to stamp
    /// `yourRole` per entry").
    pub fn list_rooms(&self, requesting_session_id: Option<&str>) -> Vec<RoomInfo> {
        let mut infos: Vec<RoomInfo> = self
            .rooms
            .iter()
            .map(|r| RoomInfo {
                id: r.id.clone(),
                name: r.name.clone(),
                description: r.description.clone(),
                persistent: r.persistent,
                has_password: r.has_password(),
                member_count: r.members.len(),
                your_role: requesting_session_id.and_then(|id| r.role_of(id)),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn has(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn is_member(&self, room_id: &str, session_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|r| r.members.contains(session_id))
            .unwrap_or(false)
    }

    pub fn get_user_role(&self, room_id: &str, session_id: &str) -> Option<Role> {
        self.rooms.get(room_id).and_then(|r| r.role_of(session_id))
    }

    pub fn get_room_permissions(&self, room_id: &str) -> Option<RoomPermissions> {
        self.rooms.get(room_id).map(|r| r.permissions.clone())
    }

    pub fn get_room_config(&self, room_id: &str) -> Option<RoomConfig> {
        self.rooms.get(room_id).map(|r| r.config.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("map() is only ever called with object literals"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::Transport;
    use tokio::sync::mpsc;

    fn transport() -> Transport {
        let (tx, _rx) = mpsc::channel(8);
        tx
    }

    #[test]
    fn seeds_general_and_random() {
        let rooms = RoomRegistry::new();
        assert!(rooms.has("general"));
        assert!(rooms.has("random"));
        assert_eq!(rooms.room_count(), 2);
    }

    #[test]
    fn join_is_idempotent_and_rejects_unknown_room() {
        let rooms = RoomRegistry::new();
        let sessions = SessionRegistry::new();
        let id = sessions.register(transport());
        sessions.authenticate(&id, "alice", None).unwrap();

        rooms.join_room(&sessions, "general", &id, "alice", None).unwrap();
        rooms.join_room(&sessions, "general", &id, "alice", None).unwrap();
        assert_eq!(rooms.get_members("general").unwrap().len(), 1);

        let err = rooms
            .join_room(&sessions, "nope", &id, "alice", None)
            .unwrap_err();
        assert_eq!(err, RoomError::NotFound("nope".to_string()));
    }

    #[test]
    fn join_requires_correct_password() {
        let rooms = RoomRegistry::new();
        rooms
            .create_room("secret", "alice", None, None, true, Some("sesame".to_string()))
            .unwrap();
        let sessions = SessionRegistry::new();
        let id = sessions.register(transport());
        sessions.authenticate(&id, "bob", None).unwrap();

        assert_eq!(
            rooms.join_room(&sessions, "secret", &id, "bob", None).unwrap_err(),
            RoomError::PasswordRequired
        );
        assert_eq!(
            rooms
                .join_room(&sessions, "secret", &id, "bob", Some("wrong"))
                .unwrap_err(),
            RoomError::WrongPassword
        );
        rooms
            .join_room(&sessions, "secret", &id, "bob", Some("sesame"))
            .unwrap();
    }

    #[test]
    fn non_persistent_room_destroyed_when_empty() {
        let rooms = RoomRegistry::new();
        rooms.create_room("temp", "alice", None, None, false, None).unwrap();
        let sessions = SessionRegistry::new();
        let id = sessions.register(transport());
        sessions.authenticate(&id, "alice", None).unwrap();

        rooms.join_room(&sessions, "temp", &id, "alice", None).unwrap();
        assert!(rooms.has("temp"));
        rooms.leave_room(&sessions, "temp", &id, "alice").unwrap();
        assert!(!rooms.has("temp"));
    }

    #[test]
    fn broadcast_requires_membership() {
        let rooms = RoomRegistry::new();
        let sessions = SessionRegistry::new();
        let id = sessions.register(transport());
        sessions.authenticate(&id, "alice", None).unwrap();

        let err = rooms
            .broadcast_chat(&sessions, "general", &id, "alice", "hi", None)
            .unwrap_err();
        assert_eq!(err, RoomError::NotMember);
    }

    #[test]
    fn set_user_role_honors_hierarchy() {
        let rooms = RoomRegistry::new();
        let sessions = SessionRegistry::new();
        let owner = sessions.register(transport());
        sessions.authenticate(&owner, "owner", None).unwrap();
        rooms.join_room(&sessions, "general", &owner, "owner", None).unwrap();
        rooms.set_user_role("general", "server", &owner, Role::Admin).unwrap();

        let member = sessions.register(transport());
        sessions.authenticate(&member, "mem", None).unwrap();
        rooms.join_room(&sessions, "general", &member, "mem", None).unwrap();

        rooms.set_user_role("general", &owner, &member, Role::Admin).unwrap();
        assert_eq!(rooms.get_user_role("general", &member), Some(Role::Admin));
    }

    #[test]
    fn list_rooms_stamps_your_role_and_hides_password() {
        let rooms = RoomRegistry::new();
        let sessions = SessionRegistry::new();
        let id = sessions.register(transport());
        sessions.authenticate(&id, "alice", None).unwrap();
        rooms
            .create_room("vault", &id, None, None, true, Some("sesame".to_string()))
            .unwrap();
        rooms
            .join_room(&sessions, "vault", &id, "alice", Some("sesame"))
            .unwrap();

        let infos = rooms.list_rooms(Some(&id));
        let vault = infos.iter().find(|r| r.id == "vault").unwrap();
        assert!(vault.has_password);
        assert_eq!(vault.your_role, Some(Role::Owner));

        let general = infos.iter().find(|r| r.id == "general").unwrap();
        assert_eq!(general.your_role, None);

        let anonymous = rooms.list_rooms(None);
        assert!(anonymous.iter().all(|r| r.your_role.is_none()));
    }

    #[test]
    fn get_history_requires_membership_and_clamps_for_members() {
        let rooms = RoomRegistry::new();
        let sessions = SessionRegistry::new();
        let owner = sessions.register(transport());
        sessions.authenticate(&owner, "owner", None).unwrap();
        rooms.join_room(&sessions, "general", &owner, "owner", None).unwrap();

        for i in 0..5 {
            rooms
                .broadcast_chat(&sessions, "general", &owner, "owner", &format!("msg{i}"), None)
                .unwrap();
        }

        let outsider = sessions.register(transport());
        sessions.authenticate(&outsider, "outsider", None).unwrap();
        assert_eq!(
            rooms.get_history("general", &outsider, 10).unwrap_err(),
            RoomError::NotMember
        );

        let history = rooms.get_history("general", &owner, 10).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().unwrap().payload["message"], "msg4");
    }
}
