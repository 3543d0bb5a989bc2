//! Direct messages (spec §8 scenario 2).

mod common;

use common::{TestServer, action_envelope, is_response_for};
use serde_json::json;

#[tokio::test]
async fn alice_sends_bob_a_direct_message() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    alice.auth("Alice").await;
    bob.auth("Bob").await;

    alice
        .send_json(action_envelope(
            "dm",
            json!({ "to": "Bob", "message": "Hey Bob, private message!" }),
        ))
        .await;

    let response = alice.recv_until(|v| is_response_for(v, "dm")).await;
    assert_eq!(response["payload"]["success"], true);
    assert_eq!(response["payload"]["data"]["delivered"], true);

    let received = bob
        .recv_until(|v| v.get("type").and_then(|t| t.as_str()) == Some("chat"))
        .await;
    assert_eq!(received["from"], "Alice");
    assert_eq!(received["to"], "Bob");
    assert_eq!(received["payload"]["dm"], true);
    assert_eq!(received["payload"]["message"], "Hey Bob, private message!");
}

#[tokio::test]
async fn dm_to_offline_user_fails() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    alice.auth("Alice").await;

    alice
        .send_json(action_envelope("dm", json!({ "to": "Ghost", "message": "hi" })))
        .await;
    let response = alice.recv_until(|v| is_response_for(v, "dm")).await;
    assert_eq!(response["payload"]["success"], false);
}

#[tokio::test]
async fn raw_chat_dm_echoes_to_sender() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    alice.auth("Alice").await;
    bob.auth("Bob").await;

    alice
        .send_json(json!({
            "type": "chat",
            "to": "Bob",
            "payload": { "message": "quick note" }
        }))
        .await;

    let echoed = alice
        .recv_until(|v| v.get("type").and_then(|t| t.as_str()) == Some("chat"))
        .await;
    assert_eq!(echoed["payload"]["message"], "quick note");
}
