//! WebSocket handler for client connections.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};

use super::connection::{ChannelConnection, ConnectionHandle};
use super::types::{SendMessage, WsCommand};
use crate::api::AppState;
use crate::auth::session_token_from_headers;
use crate::error::ChatResult;

/// WebSocket upgrade handler.
///
/// GET /ws
///
/// The socket is bound to the session named by the `sid` cookie. Without a
/// live session the upgrade completes and the socket is closed at once.
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let session = session_token_from_headers(&headers)
        .and_then(|token| state.registry.find_by_token(token));

    match session {
        Some(session) => {
            info!("WebSocket upgrade request from user {}", session.user_id);
            ws.on_upgrade(move |socket| {
                handle_ws_connection(socket, state, session.token, session.user_id)
            })
        }
        None => {
            debug!("WebSocket upgrade without a live session, closing");
            ws.on_upgrade(|mut socket| async move {
                let _ = socket.send(Message::Close(None)).await;
            })
        }
    }
}

/// Handle a WebSocket connection.
async fn handle_ws_connection(socket: WebSocket, state: AppState, token: String, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let (conn, mut outbound) = ChannelConnection::new();
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    if !state.registry.attach_connection(&token, conn.clone()) {
        debug!("Session of user {} ended before the socket attached", user_id);
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if state.registry.find_by_token(&token).is_none() {
                    info!("Session of user {} expired, closing socket", user_id);
                    break;
                }
                match serde_json::from_str::<WsCommand>(text.as_str()) {
                    Ok(cmd) => {
                        if let Err(e) = handle_command(&state, &user_id, cmd).await {
                            warn!("Failed to handle command from user {}: {}", user_id, e);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse command from user {}: {}", user_id, e);
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                debug!("Received binary message from user {}, ignoring", user_id);
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!("User {} closed WebSocket connection", user_id);
                break;
            }
            Err(e) => {
                warn!("WebSocket error for user {}: {}", user_id, e);
                break;
            }
        }
    }

    // Closed before detaching, so no broadcast can pick the handle up again.
    conn.close();
    state.registry.detach_connection(&token, conn_id);
    send_task.abort();
    info!("WebSocket connection closed for user {}", user_id);
}

/// Handle a command from a client.
async fn handle_command(state: &AppState, user_id: &str, cmd: WsCommand) -> ChatResult<()> {
    match cmd {
        WsCommand::SendMessage(SendMessage {
            group,
            to_user,
            message,
        }) => {
            state
                .relay
                .relay_chat_message(user_id, &group, &to_user, &message)
                .await?;
            Ok(())
        }
    }
}
