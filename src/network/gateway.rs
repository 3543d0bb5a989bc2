//! axum `Router`: the WebSocket upgrade endpoint plus the read-only HTTP
//! side-channel (spec §4.6, §6).

use std::sync::Arc;

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Server;
use crate::network::dispatcher;

pub fn build_router(server: Arc<Server>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/rooms", get(list_rooms))
        .route("/rooms/:id", get(room_detail))
        .route("/rooms/:id/permissions", get(room_permissions))
        .route("/users", get(users))
        .route("/metrics", get(metrics_text))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn ws_upgrade(State(server): State<Arc<Server>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| dispatcher::handle_connection(server, socket))
}

async fn health(State(server): State<Arc<Server>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime": server.uptime_secs(),
        "started_at": server.started_at,
    }))
}

async fn stats(State(server): State<Arc<Server>>) -> impl IntoResponse {
    Json(json!({
        "connections": server.sessions.count(),
        "authenticated": server.sessions.authenticated_count(),
        "rooms": server.rooms.room_count(),
        "started_at": server.started_at,
        "uptime": server.uptime_secs(),
    }))
}

async fn list_rooms(State(server): State<Arc<Server>>) -> impl IntoResponse {
    Json(json!({ "rooms": server.rooms.list_rooms(None) }))
}

async fn room_detail(State(server): State<Arc<Server>>, Path(id): Path<String>) -> impl IntoResponse {
    match server.rooms.get_members(&id) {
        Ok(members) => Json(json!({ "room_id": id, "members": members })).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn room_permissions(State(server): State<Arc<Server>>, Path(id): Path<String>) -> impl IntoResponse {
    match (server.rooms.get_room_permissions(&id), server.rooms.get_room_config(&id)) {
        (Some(permissions), Some(config)) => {
            Json(json!({ "room_id": id, "permissions": permissions, "config": config })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn users(State(server): State<Arc<Server>>) -> impl IntoResponse {
    let users: Vec<_> = server
        .sessions
        .list_online()
        .into_iter()
        .map(|u| json!({ "name": u.name, "connected_at": u.connected_at, "rooms": u.rooms }))
        .collect();
    Json(json!({ "users": users }))
}

async fn metrics_text() -> impl IntoResponse {
    crate::metrics::gather_metrics()
}
