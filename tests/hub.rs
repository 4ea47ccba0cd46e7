//! End-to-end tests over a real listener, HTTP client and WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use otp_hub::hub::chat;
use otp_hub::{Hub, HubConfig, StaticAuthenticator, http};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ============================================================================
// Harness
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    hub: Arc<Hub>,
    server: JoinHandle<otp_hub::Result<()>>,
}

impl TestServer {
    async fn boot(config: HubConfig) -> Self {
        let hub = Hub::new(config, chat::handlers().unwrap()).unwrap();
        let auth = Arc::new(StaticAuthenticator::new().with_account("percy", "123"));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(http::serve(listener, Arc::clone(&hub), auth));
        Self { addr, hub, server }
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{}/login", self.addr))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .unwrap()
    }

    async fn otp(&self) -> String {
        let response = self.login("percy", "123").await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["otp"].as_str().unwrap().to_owned()
    }

    async fn try_connect(&self, query: &str) -> Result<WsStream, tungstenite::Error> {
        let url = format!("ws://{}/ws{query}", self.addr);
        connect_async(url).await.map(|(ws, _)| ws)
    }

    async fn connect(&self) -> WsStream {
        let otp = self.otp().await;
        self.try_connect(&format!("?otp={otp}")).await.unwrap()
    }

    async fn wait_for_connections(&self, count: usize) {
        timeout(TIMEOUT, async {
            while self.hub.connection_count() != count {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection count reached");
    }

    async fn stop(self) {
        self.hub.shutdown().await;
        timeout(TIMEOUT, self.server)
            .await
            .expect("server stops")
            .unwrap()
            .unwrap();
    }
}

fn rejected_status(err: tungstenite::Error) -> u16 {
    match err {
        tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
}

async fn send(ws: &mut WsStream, event: Value) {
    ws.send(Message::text(event.to_string())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn next_event(ws: &mut WsStream) -> Value {
    loop {
        let frame = timeout(TIMEOUT, ws.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn login_issues_fresh_tokens() {
    let server = TestServer::boot(HubConfig::default()).await;

    let first = server.otp().await;
    let second = server.otp().await;

    assert!(!first.is_empty());
    assert_ne!(first, second);
    assert_eq!(server.hub.tokens().len(), 2);

    server.stop().await;
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let server = TestServer::boot(HubConfig::default()).await;

    assert_eq!(server.login("percy", "wrong").await.status().as_u16(), 401);
    assert_eq!(server.login("nobody", "123").await.status().as_u16(), 401);
    assert!(server.hub.tokens().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn login_rejects_malformed_body() {
    let server = TestServer::boot(HubConfig::default()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/login", server.addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(server.hub.tokens().is_empty());

    server.stop().await;
}

// ============================================================================
// Upgrade
// ============================================================================

#[tokio::test]
async fn upgrade_succeeds_exactly_once() {
    let server = TestServer::boot(HubConfig::default()).await;
    let otp = server.otp().await;

    let _ws = server.try_connect(&format!("?otp={otp}")).await.unwrap();
    server.wait_for_connections(1).await;

    let err = server.try_connect(&format!("?otp={otp}")).await.unwrap_err();
    assert_eq!(rejected_status(err), 401);
    assert_eq!(server.hub.connection_count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn upgrade_requires_token() {
    let server = TestServer::boot(HubConfig::default()).await;

    let err = server.try_connect("").await.unwrap_err();
    assert_eq!(rejected_status(err), 401);

    let err = server.try_connect("?otp=").await.unwrap_err();
    assert_eq!(rejected_status(err), 401);

    let err = server.try_connect("?otp=not-a-token").await.unwrap_err();
    assert_eq!(rejected_status(err), 401);

    assert_eq!(server.hub.connection_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn upgrade_rejects_unparsable_query_without_detail() {
    let server = TestServer::boot(HubConfig::default()).await;
    let otp = server.otp().await;

    let err = server
        .try_connect(&format!("?otp={otp}&otp=bogus"))
        .await
        .unwrap_err();

    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status().as_u16(), 401);
            let body = response.body().as_deref().unwrap_or_default();
            assert!(body.is_empty(), "401 body must not explain the rejection");
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
    assert_eq!(server.hub.connection_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn upgrade_rejects_expired_token() {
    let config = HubConfig::new().with_token_retention(Duration::from_millis(200));
    let server = TestServer::boot(config).await;
    let otp = server.otp().await;

    sleep(Duration::from_millis(400)).await;

    let err = server.try_connect(&format!("?otp={otp}")).await.unwrap_err();
    assert_eq!(rejected_status(err), 401);

    server.stop().await;
}

#[tokio::test]
async fn plain_http_with_valid_token_is_bad_request() {
    let server = TestServer::boot(HubConfig::default()).await;
    let otp = server.otp().await;

    let response = reqwest::get(format!("http://{}/ws?otp={otp}", server.addr))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(server.hub.connection_count(), 0);

    server.stop().await;
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn message_fans_out_to_room() {
    let server = TestServer::boot(HubConfig::default()).await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    server.wait_for_connections(2).await;

    send(
        &mut alice,
        json!({"type": "send_message", "payload": {"message": "hello", "from": "alice"}}),
    )
    .await;

    for ws in [&mut alice, &mut bob] {
        let event = next_event(ws).await;
        assert_eq!(event["type"], "new_message");
        assert_eq!(event["payload"]["message"], "hello");
        assert_eq!(event["payload"]["from"], "alice");
        assert!(event["payload"]["sent"].is_string());
    }

    server.stop().await;
}

#[tokio::test]
async fn rooms_isolate_messages() {
    let server = TestServer::boot(HubConfig::default()).await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    server.wait_for_connections(2).await;

    send(&mut bob, json!({"type": "change_room", "payload": {"name": "rust"}})).await;
    // Round trip through bob's own room to know the move has landed
    send(
        &mut bob,
        json!({"type": "send_message", "payload": {"message": "ping", "from": "bob"}}),
    )
    .await;
    assert_eq!(next_event(&mut bob).await["payload"]["message"], "ping");

    send(
        &mut alice,
        json!({"type": "send_message", "payload": {"message": "general only", "from": "alice"}}),
    )
    .await;
    assert_eq!(next_event(&mut alice).await["payload"]["message"], "general only");

    assert!(timeout(Duration::from_millis(200), bob.next()).await.is_err());

    server.stop().await;
}

#[tokio::test]
async fn unknown_type_is_reported() {
    let server = TestServer::boot(HubConfig::default()).await;
    let mut ws = server.connect().await;
    server.wait_for_connections(1).await;

    send(&mut ws, json!({"type": "launch_missiles", "payload": {}})).await;

    let event = next_event(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["payload"]["tag"], "launch_missiles");
    assert_eq!(server.hub.connection_count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn malformed_frame_closes_connection() {
    let server = TestServer::boot(HubConfig::default()).await;
    let mut ws = server.connect().await;
    server.wait_for_connections(1).await;

    ws.send(Message::text("{not json")).await.unwrap();

    server.wait_for_connections(0).await;

    server.stop().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn closing_one_client_leaves_others() {
    let server = TestServer::boot(HubConfig::default()).await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    server.wait_for_connections(2).await;

    alice.close(None).await.unwrap();
    server.wait_for_connections(1).await;

    send(
        &mut bob,
        json!({"type": "send_message", "payload": {"message": "still here", "from": "bob"}}),
    )
    .await;
    assert_eq!(next_event(&mut bob).await["payload"]["message"], "still here");

    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_clients() {
    let server = TestServer::boot(HubConfig::default()).await;
    let mut ws = server.connect().await;
    server.wait_for_connections(1).await;

    let hub = Arc::clone(&server.hub);
    server.stop().await;

    let closed = timeout(TIMEOUT, async {
        while let Some(Ok(frame)) = ws.next().await {
            if frame.is_close() {
                return true;
            }
        }
        true
    })
    .await
    .expect("socket closes");

    assert!(closed);
    assert_eq!(hub.connection_count(), 0);
    assert!(hub.is_closed());
}
