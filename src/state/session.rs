//! Session and Identity state (spec §3 "Session", "Identity").

use crate::protocol::Envelope;
use axum::extract::ws::{CloseFrame, Message as WsMessage};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Server-generated, unique for the connection's lifetime.
pub type SessionId = String;

/// The per-connection handle used to push frames to a client.
///
/// Kept as a cheap, cloneable `mpsc::Sender` (not the raw socket) so both
/// the dispatcher's reader task and a concurrent room broadcast can push
/// frames to the same connection — the shape the Govcraft websocket
/// reference uses for its `WebSocketConnection::sender`.
pub type Transport = mpsc::Sender<WsMessage>;

/// Server-side state tied to one open connection (spec §3).
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub transport: Transport,
    pub connected_at: DateTime<Utc>,
    pub authenticated: bool,
    pub token: Option<String>,
    pub rooms: HashSet<String>,
}

impl Session {
    pub fn new(id: SessionId, transport: Transport) -> Self {
        Self {
            name: id.clone(),
            id,
            transport,
            connected_at: Utc::now(),
            authenticated: false,
            token: None,
            rooms: HashSet::new(),
        }
    }

    /// Best-effort send; silently drops the frame if the transport's
    /// receiving half has already gone away (closed socket).
    pub fn send(&self, envelope: &Envelope) {
        let _ = self.transport.try_send(WsMessage::Text(envelope.encode()));
    }

    /// Close the underlying transport with a specific close code/reason,
    /// used for the reconnect-takeover protocol (spec §4.3, §6).
    pub fn close_with_code(&self, code: u16, reason: &'static str) {
        let _ = self.transport.try_send(WsMessage::Close(Some(CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        })));
    }

    /// Whether the transport's receiving half has been dropped — used by
    /// the periodic zombie sweep (spec §4.5).
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}

/// Server-side state tied to an authenticated name, surviving the
/// connection (spec §3 "Identity"). Never removed once created.
#[derive(Debug, Clone)]
pub struct Identity {
    pub token: String,
    pub last_user_id: SessionId,
    pub rooms: HashSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Generate a fresh, opaque reconnect token.
pub fn generate_token() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Generate a fresh, opaque session id.
pub fn generate_session_id() -> SessionId {
    uuid::Uuid::new_v4().simple().to_string()
}
