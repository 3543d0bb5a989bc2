//! Unified error handling for the AgentRoom service.
//!
//! Mirrors the split the reference IRC daemon uses: one error type per
//! subsystem, each able to render itself as a wire-level reply and to
//! hand back a stable string for metrics labeling.

use crate::protocol::Envelope;
use thiserror::Error;

/// Errors raised while authenticating a session (`action: auth`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("name is required")]
    EmptyName,

    #[error("Name '{0}' is already taken")]
    NameTaken(String),

    #[error("Invalid reconnect token for '{0}'")]
    InvalidToken(String),
}

impl AuthError {
    /// Stable code used for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyName => "empty_name",
            Self::NameTaken(_) => "name_taken",
            Self::InvalidToken(_) => "invalid_token",
        }
    }
}

/// Errors raised by room operations (create/join/leave/broadcast/roles).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room_id is required")]
    MissingRoomId,

    #[error("invalid room id '{0}': must match ^[a-zA-Z0-9_-]+$")]
    InvalidRoomId(String),

    #[error("room '{0}' already exists")]
    DuplicateRoomId(String),

    #[error("room '{0}' not found")]
    NotFound(String),

    #[error("room requires a password")]
    PasswordRequired,

    #[error("Incorrect room password")]
    WrongPassword,

    #[error("you are not a member of this room")]
    NotMember,

    #[error("user '{0}' is not a member of this room")]
    TargetNotMember(String),

    #[error("you do not have permission to do that")]
    PermissionDenied,

    #[error("invalid role '{0}'")]
    InvalidRole(String),
}

impl RoomError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingRoomId => "missing_room_id",
            Self::InvalidRoomId(_) => "invalid_room_id",
            Self::DuplicateRoomId(_) => "duplicate_room_id",
            Self::NotFound(_) => "room_not_found",
            Self::PasswordRequired => "password_required",
            Self::WrongPassword => "wrong_password",
            Self::NotMember => "not_member",
            Self::TargetNotMember(_) => "target_not_member",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidRole(_) => "invalid_role",
        }
    }
}

/// Errors surfaced by the per-connection dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid message format. Expected JSON.")]
    MalformedEnvelope,

    #[error("Authenticate first. Send an 'action' with your name.")]
    NotAuthenticated,

    #[error("Unsupported message type")]
    UnsupportedType,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("recipient '{0}' not found or offline")]
    RecipientOffline(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

impl DispatchError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope => "malformed_envelope",
            Self::NotAuthenticated => "not_authenticated",
            Self::UnsupportedType => "unsupported_type",
            Self::MissingField(_) => "missing_field",
            Self::RecipientOffline(_) => "recipient_offline",
            Self::Auth(e) => e.error_code(),
            Self::Room(e) => e.error_code(),
        }
    }

    /// The numeric wire error code (§6/§7), when this error warrants a bare
    /// `error` envelope rather than a `response(success=false)`.
    pub fn wire_code(&self) -> u16 {
        match self {
            Self::MalformedEnvelope => 400,
            Self::UnsupportedType => 400,
            Self::NotAuthenticated => 401,
            Self::RecipientOffline(_) => 404,
            Self::MissingField(_) | Self::Auth(_) | Self::Room(_) => 400,
        }
    }

    /// Render this error as a standalone `error` envelope (§6).
    pub fn to_error_envelope(&self) -> Envelope {
        Envelope::error(self.wire_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_codes() {
        assert_eq!(AuthError::EmptyName.error_code(), "empty_name");
        assert_eq!(
            AuthError::NameTaken("alice".into()).error_code(),
            "name_taken"
        );
    }

    #[test]
    fn room_error_codes() {
        assert_eq!(RoomError::NotMember.error_code(), "not_member");
        assert_eq!(
            RoomError::InvalidRoomId("bad room".into()).error_code(),
            "invalid_room_id"
        );
    }

    #[test]
    fn dispatch_error_wire_codes() {
        assert_eq!(DispatchError::MalformedEnvelope.wire_code(), 400);
        assert_eq!(DispatchError::NotAuthenticated.wire_code(), 401);
        assert_eq!(
            DispatchError::RecipientOffline("bob".into()).wire_code(),
            404
        );
    }

    #[test]
    fn dispatch_error_from_room_error_keeps_code() {
        let err: DispatchError = RoomError::WrongPassword.into();
        assert_eq!(err.error_code(), "wrong_password");
    }
}
