//! Permission model (spec §4.2): pure logic, no side effects, no I/O.
//!
//! Role hierarchy, per-action authorization, and per-message visibility
//! filtering all live here so the room broadcast engine can stay a thin
//! caller of these functions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Total order of room authority: `Guest < Member < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Member,
    Admin,
    Owner,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_ascii_lowercase().as_str() {
            "guest" => Some(Role::Guest),
            "member" => Some(Role::Member),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

/// A permission-gated room action (spec §4.2's resolution table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    DeleteRoom,
    TransferOwnership,
    ModifyRoom,
    ViewAuditLog,
    SetUserRole,
    KickMember,
    BanMember,
    ViewPublicMessages,
    ReceiveDm,
    SendMessage,
    SendRestrictedMessage,
    ViewHistory,
    InviteMembers,
    ModifyPermissions,
    DeleteMessages,
    EditMessages,
    PinMessages,
    ViewMembers,
    SendDm,
}

/// Per-room action → allowed-roles table (Glossary "Default Permissions").
#[derive(Debug, Clone, Serialize)]
pub struct RoomPermissions {
    pub can_send_message: HashSet<Role>,
    pub can_view_history: HashSet<Role>,
    pub can_create_restricted_message: HashSet<Role>,
    pub can_invite_members: HashSet<Role>,
    pub can_kick_members: HashSet<Role>,
    pub can_modify_permissions: HashSet<Role>,
    pub can_delete_messages: HashSet<Role>,
    pub can_edit_messages: HashSet<Role>,
    pub can_pin_messages: HashSet<Role>,
    pub can_view_members: HashSet<Role>,
    pub can_send_dm: HashSet<Role>,
}

impl Default for RoomPermissions {
    fn default() -> Self {
        use Role::*;
        Self {
            can_send_message: [Owner, Admin, Member].into(),
            can_view_history: [Owner, Admin, Member].into(),
            can_create_restricted_message: [Owner, Admin].into(),
            can_invite_members: [Owner, Admin].into(),
            can_kick_members: [Owner, Admin].into(),
            can_modify_permissions: [Owner, Admin].into(),
            can_delete_messages: [Owner, Admin].into(),
            can_edit_messages: [Owner, Admin].into(),
            can_pin_messages: [Owner, Admin].into(),
            can_view_members: [Owner, Admin, Member, Guest].into(),
            can_send_dm: [Owner, Admin, Member].into(),
        }
    }
}

/// Per-room defaults for new members and message visibility.
#[derive(Debug, Clone, Serialize)]
pub struct RoomConfig {
    pub default_visibility: Visibility,
    pub default_role: Role,
    /// Advisory only (spec §1 Non-goals) — never enforced.
    pub message_rate_limit: u32,
    /// -1 means unlimited.
    pub member_history_limit: i64,
    pub persistent: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_visibility: Visibility::Public,
            default_role: Role::Member,
            message_rate_limit: 60,
            member_history_limit: -1,
            persistent: false,
        }
    }
}

/// Visibility rule attached to a restricted chat envelope (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    RoleBased,
    UserBased,
    Private,
}

/// The optional per-message permission attached by restricted sends.
///
/// `allowed_users`/`denied_users` are session ids, matching the id space
/// `canViewMessage`'s `userId` parameter is drawn from (spec §4.4 calls it
/// with `memberSessionId`). Human-facing names given to
/// `permission.send_restricted` are resolved to session ids by the
/// dispatcher before this struct is constructed (documented in DESIGN.md).
#[derive(Debug, Clone)]
pub struct MessagePermission {
    pub visibility: Visibility,
    pub allowed_roles: Vec<Role>,
    pub allowed_users: Vec<String>,
    pub denied_users: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Resolve whether `user_role` may perform `action` in a room with
/// `room_permissions`, optionally relative to `target_role` (spec §4.2).
///
/// `target_role` means different things per action: for `KickMember` /
/// `BanMember` it is the target member's *current* role; for
/// `SetUserRole` it is the *new* role being assigned.
pub fn can_perform_action(
    action: Action,
    user_role: Role,
    room_permissions: &RoomPermissions,
    target_role: Option<Role>,
) -> bool {
    match action {
        Action::DeleteRoom | Action::TransferOwnership => user_role == Role::Owner,
        Action::ModifyRoom | Action::ViewAuditLog => user_role >= Role::Admin,
        Action::SetUserRole => match user_role {
            Role::Owner => true,
            Role::Admin => target_role.is_none_or(|r| r <= Role::Member),
            _ => false,
        },
        Action::KickMember | Action::BanMember => {
            room_permissions.can_kick_members.contains(&user_role)
                && target_role.is_some_and(|target| user_role > target)
        }
        Action::ViewPublicMessages => true,
        Action::ReceiveDm => user_role != Role::Guest,
        Action::SendMessage => room_permissions.can_send_message.contains(&user_role),
        Action::SendRestrictedMessage => room_permissions
            .can_create_restricted_message
            .contains(&user_role),
        Action::ViewHistory => room_permissions.can_view_history.contains(&user_role),
        Action::InviteMembers => room_permissions.can_invite_members.contains(&user_role),
        Action::ModifyPermissions => room_permissions.can_modify_permissions.contains(&user_role),
        Action::DeleteMessages => room_permissions.can_delete_messages.contains(&user_role),
        Action::EditMessages => room_permissions.can_edit_messages.contains(&user_role),
        Action::PinMessages => room_permissions.can_pin_messages.contains(&user_role),
        Action::ViewMembers => room_permissions.can_view_members.contains(&user_role),
        Action::SendDm => room_permissions.can_send_dm.contains(&user_role),
    }
}

/// Resolve whether `viewer_id` may see a message sent by `sender_id` with
/// the given optional restriction, under `default_visibility` (spec §4.2).
pub fn can_view_message(
    sender_id: &str,
    viewer_id: &str,
    viewer_role: Role,
    permission: Option<&MessagePermission>,
    default_visibility: Visibility,
) -> bool {
    if viewer_id == sender_id {
        return true;
    }
    if viewer_role == Role::Owner {
        return true;
    }
    if let Some(permission) = permission {
        if let Some(expires_at) = permission.expires_at {
            if expires_at < Utc::now() {
                return false;
            }
        }
        if permission.denied_users.iter().any(|u| u == viewer_id) {
            return false;
        }
    }

    let visibility = permission.map(|p| p.visibility).unwrap_or(default_visibility);
    match visibility {
        Visibility::Public => true,
        Visibility::RoleBased => permission.is_some_and(|p| {
            !p.allowed_roles.is_empty() && p.allowed_roles.iter().any(|&r| viewer_role >= r)
        }),
        Visibility::UserBased | Visibility::Private => {
            permission.is_some_and(|p| p.allowed_users.iter().any(|u| u == viewer_id))
        }
    }
}

/// Resolve whether `actor_role` may change a member from `target_current`
/// to `target_new` (spec §4.2).
pub fn can_change_role(actor_role: Role, target_current: Role, target_new: Role) -> bool {
    match actor_role {
        Role::Owner => target_current != Role::Owner,
        Role::Admin => {
            matches!(target_current, Role::Member | Role::Guest)
                && matches!(target_new, Role::Member | Role::Guest)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::Guest < Role::Member);
        assert!(Role::Member < Role::Admin);
        assert!(Role::Admin < Role::Owner);
    }

    #[test]
    fn owner_only_actions() {
        let perms = RoomPermissions::default();
        assert!(can_perform_action(
            Action::DeleteRoom,
            Role::Owner,
            &perms,
            None
        ));
        assert!(!can_perform_action(
            Action::DeleteRoom,
            Role::Admin,
            &perms,
            None
        ));
    }

    #[test]
    fn set_user_role_admin_capped_at_member() {
        let perms = RoomPermissions::default();
        assert!(can_perform_action(
            Action::SetUserRole,
            Role::Admin,
            &perms,
            Some(Role::Member)
        ));
        assert!(!can_perform_action(
            Action::SetUserRole,
            Role::Admin,
            &perms,
            Some(Role::Admin)
        ));
        assert!(can_perform_action(
            Action::SetUserRole,
            Role::Owner,
            &perms,
            Some(Role::Owner)
        ));
    }

    #[test]
    fn kick_requires_permission_and_higher_rank() {
        let perms = RoomPermissions::default();
        assert!(can_perform_action(
            Action::KickMember,
            Role::Admin,
            &perms,
            Some(Role::Member)
        ));
        assert!(!can_perform_action(
            Action::KickMember,
            Role::Admin,
            &perms,
            Some(Role::Admin)
        ));
        assert!(!can_perform_action(
            Action::KickMember,
            Role::Member,
            &perms,
            Some(Role::Guest)
        ));
    }

    #[test]
    fn receive_dm_denied_for_guest_only() {
        let perms = RoomPermissions::default();
        assert!(!can_perform_action(
            Action::ReceiveDm,
            Role::Guest,
            &perms,
            None
        ));
        assert!(can_perform_action(
            Action::ReceiveDm,
            Role::Member,
            &perms,
            None
        ));
    }

    #[test]
    fn sender_always_sees_own_message() {
        assert!(can_view_message(
            "alice",
            "alice",
            Role::Guest,
            None,
            Visibility::Public
        ));
    }

    #[test]
    fn owner_sees_everything() {
        let permission = MessagePermission {
            visibility: Visibility::Private,
            allowed_roles: vec![],
            allowed_users: vec![],
            denied_users: vec!["carol".into()],
            expires_at: None,
        };
        assert!(can_view_message(
            "alice",
            "carol",
            Role::Owner,
            Some(&permission),
            Visibility::Public
        ));
    }

    #[test]
    fn denied_users_blocks_even_non_owner() {
        let permission = MessagePermission {
            visibility: Visibility::Public,
            allowed_roles: vec![],
            allowed_users: vec![],
            denied_users: vec!["bob".into()],
            expires_at: None,
        };
        assert!(!can_view_message(
            "alice",
            "bob",
            Role::Member,
            Some(&permission),
            Visibility::Public
        ));
    }

    #[test]
    fn role_based_visibility_requires_minimum_role() {
        let permission = MessagePermission {
            visibility: Visibility::RoleBased,
            allowed_roles: vec![Role::Admin],
            allowed_users: vec![],
            denied_users: vec![],
            expires_at: None,
        };
        assert!(!can_view_message(
            "alice",
            "bob",
            Role::Member,
            Some(&permission),
            Visibility::Public
        ));
        assert!(can_view_message(
            "alice",
            "bob",
            Role::Admin,
            Some(&permission),
            Visibility::Public
        ));
    }

    #[test]
    fn expired_permission_denies_non_sender() {
        let permission = MessagePermission {
            visibility: Visibility::Public,
            allowed_roles: vec![],
            allowed_users: vec![],
            denied_users: vec![],
            expires_at: Some(Utc::now() - chrono::Duration::seconds(1)),
        };
        assert!(!can_view_message(
            "alice",
            "bob",
            Role::Member,
            Some(&permission),
            Visibility::Public
        ));
    }

    #[test]
    fn change_role_owner_cannot_touch_other_owner() {
        assert!(!can_change_role(Role::Owner, Role::Owner, Role::Member));
        assert!(can_change_role(Role::Owner, Role::Member, Role::Admin));
    }

    #[test]
    fn change_role_admin_limited_to_member_guest_swap() {
        assert!(can_change_role(Role::Admin, Role::Member, Role::Guest));
        assert!(!can_change_role(Role::Admin, Role::Member, Role::Admin));
    }
}
