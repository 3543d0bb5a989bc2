//! Per-connection state machine: welcome → auth → normal traffic →
//! disconnect cleanup (spec §4.5).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::Server;
use crate::error::DispatchError;
use crate::protocol::{Envelope, EnvelopeType, room_id_from_target};
use crate::telemetry::{ActionTimer, ActionTraceContext};

use super::actions;

/// Actions that may be dispatched before `auth` succeeds (spec §4.5 table).
const PRE_AUTH_ACTIONS: &[&str] = &[
    "auth",
    "room.list",
    "room.members",
    "users.list",
    "ping",
    "permission.get_room_config",
];

/// Drive one WebSocket connection end to end. Spawns its own writer task so
/// the room broadcast fan-out and this reader share the same transport
/// channel (spec §3 "Session", §5).
pub async fn handle_connection(server: Arc<Server>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(64);
    let session_id = server.sessions.register(tx);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    if let Some(session) = server.sessions.get_by_id(&session_id) {
        session.send(&Envelope::welcome(&session_id));
    }
    tracing::info!(session_id = %session_id, "connection opened");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => on_frame(&server, &session_id, text.as_bytes()),
            Ok(WsMessage::Binary(bytes)) => on_frame(&server, &session_id, &bytes),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "transport error");
                break;
            }
        }
    }

    disconnect(&server, &session_id);
    let _ = writer.await;
}

fn disconnect(server: &Server, session_id: &str) {
    let name = server
        .sessions
        .name_of(session_id)
        .unwrap_or_else(|| session_id.to_string());
    server.rooms.remove_user_from_all(&server.sessions, session_id, &name);
    server.sessions.remove(session_id);
    tracing::info!(session_id = %session_id, "connection closed");
}

fn send_to(server: &Server, session_id: &str, envelope: &Envelope) {
    if let Some(session) = server.sessions.get_by_id(session_id) {
        session.send(envelope);
    }
}

fn on_frame(server: &Server, session_id: &str, bytes: &[u8]) {
    match Envelope::parse(bytes) {
        Some(envelope) => dispatch_envelope(server, session_id, envelope),
        None => send_to(server, session_id, &DispatchError::MalformedEnvelope.to_error_envelope()),
    }
}

fn dispatch_envelope(server: &Server, session_id: &str, envelope: Envelope) {
    match envelope.kind {
        EnvelopeType::Action => dispatch_action(server, session_id, envelope),
        EnvelopeType::Chat => dispatch_chat(server, session_id, envelope),
        EnvelopeType::System | EnvelopeType::Response | EnvelopeType::Error => {
            send_to(server, session_id, &DispatchError::UnsupportedType.to_error_envelope());
        }
    }
}

fn dispatch_action(server: &Server, session_id: &str, envelope: Envelope) {
    let Some(action) = envelope.payload.get("action").and_then(|v| v.as_str()) else {
        send_to(server, session_id, &DispatchError::MissingField("action").to_error_envelope());
        return;
    };
    let action = action.to_string();

    if !PRE_AUTH_ACTIONS.contains(&action.as_str()) && !server.sessions.is_authenticated(session_id) {
        send_to(server, session_id, &DispatchError::NotAuthenticated.to_error_envelope());
        return;
    }

    let span = ActionTraceContext::new()
        .with_action(action.clone())
        .with_session_id(session_id)
        .into_span();
    let _guard = span.enter();
    let _timer = ActionTimer::new(action.clone());

    let result = match action.as_str() {
        "auth" => actions::auth::handle(server, session_id, &envelope.payload),
        "room.create" => actions::room::create(server, session_id, &envelope.payload),
        "room.join" => actions::room::join(server, session_id, &envelope.payload),
        "room.leave" => actions::room::leave(server, session_id, &envelope.payload),
        "room.list" => actions::room::list(server, session_id, &envelope.payload),
        "room.members" => actions::room::members(server, session_id, &envelope.payload),
        "dm" => actions::dm::send(server, session_id, &envelope.payload),
        "users.list" => actions::misc::users_list(server, session_id, &envelope.payload),
        "ping" => actions::misc::ping(server, session_id, &envelope.payload),
        "permission.set_role" => actions::permission::set_role(server, session_id, &envelope.payload),
        "permission.get_my_permissions" => {
            actions::permission::get_my_permissions(server, session_id, &envelope.payload)
        }
        "permission.get_room_config" => {
            actions::permission::get_room_config(server, session_id, &envelope.payload)
        }
        "permission.send_restricted" => {
            actions::permission::send_restricted(server, session_id, &envelope.payload)
        }
        _ => Err(DispatchError::UnsupportedType),
    };

    match result {
        Ok(data) => send_to(server, session_id, &Envelope::response(&action, true, Some(data), None)),
        Err(err) => send_to(
            server,
            session_id,
            &Envelope::response(&action, false, None, Some(err.to_string())),
        ),
    }
}

fn dispatch_chat(server: &Server, session_id: &str, envelope: Envelope) {
    if !server.sessions.is_authenticated(session_id) {
        send_to(server, session_id, &DispatchError::NotAuthenticated.to_error_envelope());
        return;
    }
    let Some(message) = envelope.payload.get("message").and_then(|v| v.as_str()).filter(|m| !m.is_empty())
    else {
        send_to(server, session_id, &DispatchError::MissingField("message").to_error_envelope());
        return;
    };

    match envelope.to.as_deref() {
        Some(to) if room_id_from_target(to).is_some() => {
            let room_id = room_id_from_target(to).unwrap();
            let sender_name = server
                .sessions
                .name_of(session_id)
                .unwrap_or_else(|| session_id.to_string());
            if let Err(err) =
                server
                    .rooms
                    .broadcast_chat(&server.sessions, room_id, session_id, &sender_name, message, None)
            {
                send_to(server, session_id, &crate::error::DispatchError::Room(err).to_error_envelope());
            }
        }
        Some(to) => match actions::dm::deliver(server, session_id, to, message) {
            Ok(sent) => send_to(server, session_id, &sent),
            Err(err) => send_to(server, session_id, &err.to_error_envelope()),
        },
        None => send_to(server, session_id, &DispatchError::MissingField("to").to_error_envelope()),
    }
}

/// Periodic sweep evicting sessions whose transport closed without a normal
/// disconnect (spec §4.5, §5).
pub async fn run_zombie_sweep(server: Arc<Server>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let zombies = server.sessions.find_zombies();
        if !zombies.is_empty() {
            tracing::debug!(count = zombies.len(), "zombie sweep evicting sessions");
        }
        for (session_id, _) in zombies {
            disconnect(&server, &session_id);
        }
    }
}
