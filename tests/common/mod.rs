//! Shared test harness: boots a real AgentRoom Service on an ephemeral port
//! and gives tests a WebSocket client helper.

use agentroom_service::config::Config;
use agentroom_service::network::build_router;
use agentroom_service::Server;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub struct TestServer {
    pub addr: std::net::SocketAddr,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        let server = Server::new(Config {
            host: addr.ip(),
            port: addr.port(),
            ..Config::default()
        });
        let app = build_router(server);

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server crashed");
        });

        TestServer { addr }
    }

    pub async fn connect(&self) -> TestClient {
        let url = format!("ws://{}/ws", self.addr);
        let (stream, _) = connect_async(url).await.expect("connect websocket");
        TestClient { stream }
    }
}

pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl TestClient {
    pub async fn send_json(&mut self, value: Value) {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("send frame");
    }

    pub async fn recv_json(&mut self) -> Value {
        loop {
            match self.stream.next().await.expect("stream closed").expect("ws error") {
                Message::Text(text) => return serde_json::from_str(&text).expect("valid json"),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    /// Receive frames until one matches `predicate`, skipping the rest.
    pub async fn recv_until(&mut self, predicate: impl Fn(&Value) -> bool) -> Value {
        loop {
            let value = self.recv_json().await;
            if predicate(&value) {
                return value;
            }
        }
    }

    pub async fn auth(&mut self, name: &str) -> Value {
        self.send_json(action_envelope("auth", json!({ "name": name }))).await;
        self.recv_until(|v| is_response_for(v, "auth")).await
    }

    pub async fn join(&mut self, room_id: &str) -> Value {
        self.send_json(action_envelope("room.join", json!({ "room_id": room_id })))
            .await;
        self.recv_until(|v| is_response_for(v, "room.join")).await
    }

    pub async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }

    /// Read frames until the transport closes, returning the close code if
    /// the peer sent one (spec §6 "Close codes").
    pub async fn recv_close_code(&mut self) -> Option<u16> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Close(Some(frame))) => return Some(frame.code.into()),
                Ok(Message::Close(None)) => return Some(1000),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

pub fn action_envelope(action: &str, extra: Value) -> Value {
    let mut payload: Map<String, Value> = match extra {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    payload.insert("action".to_string(), Value::String(action.to_string()));
    json!({ "type": "action", "payload": payload })
}

pub fn is_response_for(value: &Value, action: &str) -> bool {
    value.get("type").and_then(Value::as_str) == Some("response")
        && value
            .get("payload")
            .and_then(|p| p.get("action"))
            .and_then(Value::as_str)
            == Some(action)
}

pub fn is_system_event(value: &Value, event: &str) -> bool {
    value.get("type").and_then(Value::as_str) == Some("system")
        && value
            .get("payload")
            .and_then(|p| p.get("event"))
            .and_then(Value::as_str)
            == Some(event)
}
