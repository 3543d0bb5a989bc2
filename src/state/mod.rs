//! Server-side state: sessions, identities, rooms, and the registries that
//! index them (spec §3, §4.3, §4.4).

mod room;
mod room_registry;
mod session;
mod session_registry;

pub use room::{History, JOIN_HISTORY_PREVIEW, MAX_HISTORY, Room};
pub use room_registry::{MemberView, RoomInfo, RoomRegistry};
pub use session::{Identity, Session, SessionId, Transport, generate_session_id, generate_token};
pub use session_registry::{AuthOutcome, OnlineUser, SessionRegistry};
