//! End-to-end WebSocket tests
//!
//! Starts the real router on a loopback listener and talks to it with
//! `tokio-tungstenite`, covering the HTTP checks that run before an upgrade
//! and the frames seen by real clients.
//!
//! ## Running Tests
//! ```bash
//! cargo test -p huntroom-api --test websocket
//! ```

use futures::{SinkExt, StreamExt};
use huntroom_api::auth::JwtManager;
use huntroom_api::config::{Config, LogFormat};
use huntroom_api::routes::create_router;
use huntroom_api::storage::MemoryChatStore;
use huntroom_api::AppState;
use huntroom_shared::{Identity, ManualClock, NotificationEvent};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

// ============================================================================
// Test Utilities
// ============================================================================

const JWT_SECRET: &str = "test-jwt-secret-must-be-at-least-32-characters-long";
const T0: i64 = 1_700_000_000_000;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    jwt: JwtManager,
}

impl TestServer {
    async fn start() -> Self {
        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 1,
            jwt_secret: JWT_SECRET.to_string(),
            internal_api_token: "internal-token-at-least-32-characters!!".to_string(),
            chat_retention: Duration::from_secs(60),
            alarm_poll_interval: Duration::from_secs(1),
            room_idle_timeout: Duration::from_secs(60),
            max_frame_bytes: 256,
        };
        let state = AppState::new(
            config,
            Arc::new(MemoryChatStore::new()),
            Arc::new(ManualClock::new(T0)),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            jwt: JwtManager::new(JWT_SECRET, 1),
        }
    }

    fn token(&self, user: &str, grants: &[&str]) -> String {
        let grants: Vec<String> = grants.iter().map(|g| g.to_string()).collect();
        self.jwt
            .generate_room_token(&Identity::new(user).with_name(user.to_uppercase()), &grants)
            .unwrap()
    }

    fn url(&self, path: &str) -> String {
        format!("ws://{}/api/v1/rooms/{path}", self.addr)
    }

    async fn connect(&self, path: &str, token: &str) -> Client {
        let url = format!("{}{}token={token}", self.url(path), separator(path));
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    /// Status of a handshake that is expected to be refused
    async fn refused(&self, url: String) -> u16 {
        match connect_async(url).await {
            Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("upgrade unexpectedly succeeded"),
        }
    }
}

fn separator(path: &str) -> &'static str {
    if path.contains('?') {
        "&"
    } else {
        "?"
    }
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("read error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.to_string())).await.unwrap();
}

// ============================================================================
// Handshake checks
// ============================================================================

#[tokio::test]
async fn test_rejected_before_upgrade() {
    let server = TestServer::start().await;

    // No token
    assert_eq!(server.refused(server.url("chat/P1/ws")).await, 401);

    // Garbage token
    assert_eq!(
        server
            .refused(format!("{}?token=garbage", server.url("chat/P1/ws")))
            .await,
        401
    );

    // Valid token, no grant for this room
    let token = server.token("u1", &["P2"]);
    assert_eq!(
        server
            .refused(format!("{}?token={token}", server.url("chat/P1/ws")))
            .await,
        403
    );

    // Unknown room kind
    let token = server.token("u1", &["*"]);
    assert_eq!(
        server
            .refused(format!("{}?token={token}", server.url("lobby/P1/ws")))
            .await,
        404
    );

    // Refused callers never create a room
    assert_eq!(server.state.rooms.stats().active_rooms, 0);
}

// ============================================================================
// Rooms over the wire
// ============================================================================

#[tokio::test]
async fn test_chat_round_trip() {
    let server = TestServer::start().await;
    let ada = server.token("ada", &["P1"]);
    let bob = server.token("bob", &["*"]);

    let mut a = server.connect("chat/P1/ws", &ada).await;
    assert_eq!(next_json(&mut a).await, json!([]));
    let mut b = server.connect("chat/P1/ws", &bob).await;
    assert_eq!(next_json(&mut b).await, json!([]));

    // Malformed and oversized frames are dropped without closing the socket,
    // however far past the limit they are
    send_text(&mut a, "not json").await;
    for size in [512, 4 * 1024, 64 * 1024] {
        send_text(&mut a, &format!(r#"{{"text":"{}"}}"#, "x".repeat(size))).await;
    }
    send_text(&mut a, r#"{"text":"hello"}"#).await;

    let expected = json!({"text": "hello", "name": "ADA", "timestamp": T0});
    assert_eq!(next_json(&mut a).await, expected);
    assert_eq!(next_json(&mut b).await, expected);

    // Late joiner gets the log
    let mut c = server.connect("chat/P1/ws", &bob).await;
    assert_eq!(next_json(&mut c).await, json!([expected]));
}

#[tokio::test]
async fn test_presence_scope_from_query() {
    let server = TestServer::start().await;
    let token = server.token("ada", &["W1"]);

    let mut a = server.connect("presence/W1/ws?scope=puzzle-7", &token).await;
    let snapshot = next_json(&mut a).await;
    assert_eq!(snapshot["puzzle-7"][0]["id"], "ada");
    assert_eq!(snapshot["puzzle-7"][0]["name"], "ADA");
}

#[tokio::test]
async fn test_notification_relay() {
    let server = TestServer::start().await;
    let token = server.token("ada", &["W1"]);
    let mut a = server.connect("notifications/W1/ws", &token).await;

    // Accept is acknowledged once the room has registered the socket
    for _ in 0..200 {
        if server.state.rooms.stats().open_sockets == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    server
        .state
        .rooms
        .notify(
            "W1",
            NotificationEvent::Solved {
                message: "Nice!".to_string(),
            },
        )
        .unwrap();

    assert_eq!(
        next_json(&mut a).await,
        json!({"type": "solved", "message": "Nice!", "timestamp": T0})
    );
}

#[tokio::test]
async fn test_close_updates_presence() {
    let server = TestServer::start().await;
    let ada = server.token("ada", &["W1"]);
    let bob = server.token("bob", &["W1"]);

    let mut a = server.connect("presence/W1/ws?scope=A", &ada).await;
    next_json(&mut a).await;
    let mut b = server.connect("presence/W1/ws?scope=B", &bob).await;
    next_json(&mut b).await;

    let both = next_json(&mut a).await;
    assert_eq!(both["B"][0]["id"], "bob");

    b.close(None).await.unwrap();
    let after = next_json(&mut a).await;
    assert_eq!(after, json!({"A": both["A"].clone()}));
}
