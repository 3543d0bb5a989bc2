//! Room lifecycle: creation, passwords, non-persistent destruction
//! (spec §8 scenario 6, boundary behaviors).

mod common;

use common::{TestServer, action_envelope, is_response_for};
use serde_json::json;

#[tokio::test]
async fn non_persistent_room_is_destroyed_after_last_leave() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    alice.auth("Alice").await;

    alice
        .send_json(action_envelope(
            "room.create",
            json!({ "room_id": "dev-ops", "persistent": false }),
        ))
        .await;
    alice.recv_until(|v| is_response_for(v, "room.create")).await;
    alice.join("dev-ops").await;

    alice
        .send_json(action_envelope("room.leave", json!({ "room_id": "dev-ops" })))
        .await;
    alice.recv_until(|v| is_response_for(v, "room.leave")).await;

    alice.send_json(action_envelope("room.list", json!({}))).await;
    let listing = alice.recv_until(|v| is_response_for(v, "room.list")).await;
    let rooms = listing["payload"]["data"]["rooms"].as_array().unwrap();
    assert!(!rooms.iter().any(|r| r["id"] == "dev-ops"));
}

#[tokio::test]
async fn invalid_room_id_rejected() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    alice.auth("Alice").await;

    alice
        .send_json(action_envelope("room.create", json!({ "room_id": "bad room!" })))
        .await;
    let response = alice.recv_until(|v| is_response_for(v, "room.create")).await;
    assert_eq!(response["payload"]["success"], false);
}

#[tokio::test]
async fn password_protected_room_rejects_missing_and_wrong_password() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    alice.auth("Alice").await;
    bob.auth("Bob").await;

    alice
        .send_json(action_envelope(
            "room.create",
            json!({ "room_id": "vault", "password": "sesame" }),
        ))
        .await;
    alice.recv_until(|v| is_response_for(v, "room.create")).await;

    bob.send_json(action_envelope("room.join", json!({ "room_id": "vault" })))
        .await;
    let missing = bob.recv_until(|v| is_response_for(v, "room.join")).await;
    assert_eq!(missing["payload"]["success"], false);
    assert!(missing["payload"]["error"].as_str().unwrap().contains("password"));

    bob.send_json(action_envelope(
        "room.join",
        json!({ "room_id": "vault", "password": "wrong" }),
    ))
    .await;
    let wrong = bob.recv_until(|v| is_response_for(v, "room.join")).await;
    assert_eq!(wrong["payload"]["success"], false);
    assert!(wrong["payload"]["error"].as_str().unwrap().contains("Incorrect"));

    bob.send_json(action_envelope(
        "room.join",
        json!({ "room_id": "vault", "password": "sesame" }),
    ))
    .await;
    let ok = bob.recv_until(|v| is_response_for(v, "room.join")).await;
    assert_eq!(ok["payload"]["success"], true);
}

#[tokio::test]
async fn room_join_is_idempotent() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    alice.auth("Alice").await;

    let first = alice.join("general").await;
    let second = alice.join("general").await;
    assert_eq!(first["payload"]["data"]["members"], second["payload"]["data"]["members"]);
}
