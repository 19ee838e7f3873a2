//! WebSocket gateway: per-connection lifecycle for the real-time channel
//!
//! Connect to /ws/list/:list_id?token=... ; the handshake is checked in
//! order (credential, list id syntax, list existence) and each failure class
//! closes with its own code so clients can branch. An accepted connection
//! subscribes to the list's room, decodes one inbound command at a time and
//! forwards every room broadcast back out as JSON text.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use courses_common::db::queries;

use crate::api::AppState;
use crate::rooms::{ClientCommand, CommandOutcome, RoomSubscription};

/// Close codes, one per handshake failure class
const CLOSE_UNAUTHENTICATED: u16 = 4401;
const CLOSE_INVALID_LIST_ID: u16 = 4000;
const CLOSE_LIST_NOT_FOUND: u16 = 4004;
const CLOSE_INTERNAL_ERROR: u16 = 1011;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// GET /ws/list/:list_id - upgrade and run the connection
pub async fn list_socket(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, list_id, params.token, socket))
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn handle_socket(state: AppState, list_id: String, token: Option<String>, socket: WebSocket) {
    // the credential is checked once, at connect; later revocation does not
    // terminate connections that are already subscribed
    if !state.gate.is_authorized(token.as_deref()).await {
        warn!("ws connect rejected: missing or invalid access token");
        return close_with(socket, CLOSE_UNAUTHENTICATED, "unauthenticated").await;
    }
    if Uuid::parse_str(&list_id).is_err() {
        warn!(list_id = %list_id, "ws connect rejected: invalid list id");
        return close_with(socket, CLOSE_INVALID_LIST_ID, "invalid list id").await;
    }
    match queries::get_list(&state.db, &list_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(list_id = %list_id, "ws connect rejected: list not found");
            return close_with(socket, CLOSE_LIST_NOT_FOUND, "list not found").await;
        }
        Err(e) => {
            error!(list_id = %list_id, error = %e, "ws connect failed on list lookup");
            return close_with(socket, CLOSE_INTERNAL_ERROR, "internal error").await;
        }
    }

    let mut subscription = state.rooms.subscribe(&list_id);
    info!(list_id = %list_id, "ws connected");

    let mut socket = socket;
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if handle_message(&mut socket, &subscription, &text).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong: nothing to do
                    Some(Err(e)) => {
                        debug!(list_id = %list_id, error = %e, "ws receive error");
                        break;
                    }
                }
            }
            event = subscription.next_event() => {
                match event {
                    Some(event) => {
                        let Ok(payload) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    // dropping the subscription leaves the room; no departure broadcast
    debug!(list_id = %list_id, "ws disconnected");
}

/// Decode and dispatch one inbound message. All problems are answered with a
/// direct `{"error": ...}` reply; `Err(())` means the socket itself is gone.
async fn handle_message(
    socket: &mut WebSocket,
    subscription: &RoomSubscription,
    text: &str,
) -> Result<(), ()> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return send_error(socket, "Invalid JSON".to_string()).await,
    };
    let Some(action) = value.get("action").and_then(|a| a.as_str()).map(String::from) else {
        return send_error(socket, "Missing action".to_string()).await;
    };

    let command: ClientCommand = match serde_json::from_value(value) {
        Ok(command) => command,
        Err(_) => {
            let known = matches!(
                action.as_str(),
                "add_item" | "update_item" | "delete_item" | "check_item" | "reorder_items"
            );
            let message = if known {
                format!("Invalid payload for action: {action}")
            } else {
                format!("Unknown action: {action}")
            };
            return send_error(socket, message).await;
        }
    };

    // cheap syntax checks before anything reaches the room
    match &command {
        ClientCommand::AddItem { name, .. } if name.trim().is_empty() => {
            return send_error(socket, "Missing name".to_string()).await;
        }
        ClientCommand::UpdateItem { item_id, .. }
        | ClientCommand::DeleteItem { item_id }
        | ClientCommand::CheckItem { item_id, .. }
            if Uuid::parse_str(item_id).is_err() =>
        {
            return send_error(socket, "Invalid item_id".to_string()).await;
        }
        _ => {}
    }

    debug!(list_id = %subscription.list_id(), action = %action, "ws command");
    match subscription.send_command(command).await {
        // applied commands answer through the room broadcast; a vanished
        // target is a silent no-op
        CommandOutcome::Applied | CommandOutcome::Ignored => Ok(()),
        CommandOutcome::Rejected(message) => send_error(socket, message).await,
    }
}

async fn send_error(socket: &mut WebSocket, message: String) -> Result<(), ()> {
    let payload = serde_json::json!({ "error": message }).to_string();
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}
