//! End-to-end WebSocket gateway tests over real sockets: handshake close
//! codes, command round-trips, broadcast isolation and the revocation
//! behavior for live connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use courses_common::api::ImportEntry;
use courses_common::db::models::Section;
use courses_common::db::{init_database, queries};
use courses_server::api::{create_router, AppState};
use courses_server::auth::{AccessGate, TokenGate};
use courses_server::rooms::RoomRegistry;
use courses_server::services::llm_client::Classifier;
use courses_server::services::section_assigner::SectionAssigner;

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct NullClassifier;

#[async_trait]
impl Classifier for NullClassifier {
    async fn classify_one(&self, _name: &str, _candidates: &[Section]) -> Option<String> {
        None
    }

    async fn classify_bulk(
        &self,
        _text: &str,
        _candidates: &[Section],
    ) -> Option<Vec<ImportEntry>> {
        None
    }
}

async fn start_server(auth_required: bool) -> (tempfile::TempDir, sqlx::SqlitePool, SocketAddr) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = init_database(&dir.path().join("test.db"))
        .await
        .expect("init_database");

    let classifier: Arc<dyn Classifier> = Arc::new(NullClassifier);
    let assigner = Arc::new(SectionAssigner::new(pool.clone(), classifier));
    let rooms = RoomRegistry::new(pool.clone(), Arc::clone(&assigner));
    let gate: Arc<dyn AccessGate> = Arc::new(TokenGate::new(pool.clone(), auth_required));
    let state = AppState {
        db: pool.clone(),
        rooms,
        assigner,
        gate,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.expect("serve");
    });
    (dir, pool, addr)
}

async fn connect(addr: SocketAddr, list_id: &str, token: Option<&str>) -> WsClient {
    let url = match token {
        Some(token) => format!("ws://{addr}/ws/list/{list_id}?token={token}"),
        None => format!("ws://{addr}/ws/list/{list_id}"),
    };
    let (ws, _) = connect_async(url).await.expect("ws connect");
    ws
}

async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string())).await.expect("ws send");
}

async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("ws receive error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("valid JSON from server");
        }
    }
}

async fn expect_close_code(mut ws: WsClient, expected: u16) {
    loop {
        match timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for close frame")
        {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), expected);
                return;
            }
            Some(Ok(Message::Close(None))) => panic!("close frame without a code"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("ws error instead of close frame: {e}"),
            None => panic!("stream ended without a close frame"),
        }
    }
}

#[tokio::test]
async fn missing_token_closes_with_4401() {
    let (_dir, pool, addr) = start_server(true).await;
    let list = queries::create_list(&pool, "Privée").await.unwrap();

    let ws = connect(addr, &list.id, None).await;
    expect_close_code(ws, 4401).await;

    let ws = connect(addr, &list.id, Some("pas-le-bon")).await;
    expect_close_code(ws, 4401).await;
}

#[tokio::test]
async fn malformed_list_id_closes_with_4000() {
    let (_dir, _pool, addr) = start_server(false).await;

    let ws = connect(addr, "pas-un-uuid", None).await;
    expect_close_code(ws, 4000).await;
}

#[tokio::test]
async fn unknown_list_closes_with_4004() {
    let (_dir, _pool, addr) = start_server(false).await;

    let ws = connect(addr, &uuid::Uuid::new_v4().to_string(), None).await;
    expect_close_code(ws, 4004).await;
}

#[tokio::test]
async fn add_item_reaches_every_room_subscriber_and_no_other_room() {
    let (_dir, pool, addr) = start_server(false).await;
    let list = queries::create_list(&pool, "Partagée").await.unwrap();
    let other_list = queries::create_list(&pool, "Autre").await.unwrap();

    let mut client_a = connect(addr, &list.id, None).await;
    let mut client_b = connect(addr, &list.id, None).await;
    let mut client_c = connect(addr, &other_list.id, None).await;

    send_json(
        &mut client_b,
        serde_json::json!({"action": "add_item", "name": "Lait"}),
    )
    .await;

    for client in [&mut client_a, &mut client_b] {
        let event = recv_json(client).await;
        assert_eq!(event["action"], "item_added");
        assert_eq!(event["item"]["name"], "Lait");
        assert_eq!(event["item"]["section_slug"], "produits_laitiers_oeufs");
        assert_eq!(event["item"]["quantity"], "");
        assert_eq!(event["item"]["checked"], false);
    }

    let nothing = timeout(Duration::from_millis(200), client_c.next()).await;
    assert!(nothing.is_err(), "another list's subscriber must see nothing");
}

#[tokio::test]
async fn protocol_errors_get_direct_replies_only() {
    let (_dir, pool, addr) = start_server(false).await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut sender = connect(addr, &list.id, None).await;
    let mut bystander = connect(addr, &list.id, None).await;

    sender
        .send(Message::Text("ceci n'est pas du json".to_string()))
        .await
        .unwrap();
    assert_eq!(recv_json(&mut sender).await["error"], "Invalid JSON");

    send_json(&mut sender, serde_json::json!({"name": "Lait"})).await;
    assert_eq!(recv_json(&mut sender).await["error"], "Missing action");

    send_json(&mut sender, serde_json::json!({"action": "explode"})).await;
    assert_eq!(
        recv_json(&mut sender).await["error"],
        "Unknown action: explode"
    );

    send_json(
        &mut sender,
        serde_json::json!({"action": "add_item", "name": "  "}),
    )
    .await;
    assert_eq!(recv_json(&mut sender).await["error"], "Missing name");

    send_json(
        &mut sender,
        serde_json::json!({"action": "delete_item", "item_id": "zzz"}),
    )
    .await;
    assert_eq!(recv_json(&mut sender).await["error"], "Invalid item_id");

    // none of those replies may have been broadcast
    let nothing = timeout(Duration::from_millis(200), bystander.next()).await;
    assert!(nothing.is_err(), "error replies must never be broadcast");
}

#[tokio::test]
async fn deleting_a_missing_item_is_silent() {
    let (_dir, pool, addr) = start_server(false).await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut client = connect(addr, &list.id, None).await;
    send_json(
        &mut client,
        serde_json::json!({
            "action": "delete_item",
            "item_id": uuid::Uuid::new_v4().to_string(),
        }),
    )
    .await;

    let nothing = timeout(Duration::from_millis(200), client.next()).await;
    assert!(nothing.is_err(), "a vanished target yields no reply and no event");
}

#[tokio::test]
async fn check_item_round_trip_updates_the_item() {
    let (_dir, pool, addr) = start_server(false).await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut client = connect(addr, &list.id, None).await;
    send_json(
        &mut client,
        serde_json::json!({"action": "add_item", "name": "Beurre"}),
    )
    .await;
    let added = recv_json(&mut client).await;
    let item_id = added["item"]["id"].as_str().unwrap().to_string();

    send_json(
        &mut client,
        serde_json::json!({"action": "check_item", "item_id": item_id}),
    )
    .await;
    let event = recv_json(&mut client).await;
    assert_eq!(event["action"], "item_updated");
    assert_eq!(event["item"]["checked"], true);
}

#[tokio::test]
async fn revoked_token_does_not_drop_live_connections() {
    let (_dir, pool, addr) = start_server(true).await;
    let list = queries::create_list(&pool, "Privée").await.unwrap();
    let token = queries::create_access_token(&pool, "famille").await.unwrap();

    let mut client = connect(addr, &list.id, Some(&token.token)).await;

    queries::revoke_access_token(&pool, &token.token).await.unwrap();

    // the live subscription keeps working after revocation
    send_json(
        &mut client,
        serde_json::json!({"action": "add_item", "name": "Lait"}),
    )
    .await;
    let event = recv_json(&mut client).await;
    assert_eq!(event["action"], "item_added");

    // only new handshakes are refused
    let rejected = connect(addr, &list.id, Some(&token.token)).await;
    expect_close_code(rejected, 4401).await;
}
