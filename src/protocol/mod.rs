//! Wire protocol: the envelope schema and the permission model built on it.

mod envelope;
mod permission;

pub use envelope::{Envelope, EnvelopeType, room_id_from_target, room_target};
pub use permission::{
    Action, MessagePermission, Role, RoomConfig, RoomPermissions, Visibility, can_change_role,
    can_perform_action, can_view_message,
};
