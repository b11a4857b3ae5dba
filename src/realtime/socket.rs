//! Websocket wiring: handshake authentication, the per-connection read
//! loop, and the writer task that drains the session's outbound channel.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::state::AppState;

use super::hub::RealtimeHub;
use super::protocol::{ClientMessage, ServerMessage};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Authenticates during the handshake. A missing or bad credential is
/// refused with 401 before the upgrade completes; the session never
/// exists.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let token = query.token.as_deref().ok_or(AppError::Unauthenticated)?;
    let claims = state.tokens.verify_access(token)?;
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Unauthenticated)?;

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(hub, socket, user_id)))
}

async fn handle_socket(hub: Arc<RealtimeHub>, socket: WebSocket, user_id: ObjectId) {
    let session_id = Uuid::new_v4();
    tracing::info!("✅ User connected: {} ({})", user_id.to_hex(), session_id);

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    hub.rooms.register(session_id, user_id, tx.clone()).await;

    // Writer task: one slow socket only ever blocks its own channel.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Inbound messages are handled one at a time, so a session never has
    // two in-flight intents.
    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let outcome = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => hub.handle_message(session_id, user_id, message).await,
                        Err(e) => Err(AppError::invalid_data(format!(
                            "Invalid message format: {}",
                            e
                        ))),
                    };
                    // Failed intents are reported to the originator only.
                    if let Err(err) = outcome {
                        let _ = tx.send(ServerMessage::Error {
                            message: err.to_string(),
                        });
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Socket error for user {}: {}", user_id.to_hex(), e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    // Synchronous cleanup on disconnect, no grace period.
    hub.rooms.remove_session_everywhere(session_id).await;
    send_task.abort();
    tracing::info!("❌ User disconnected: {}", user_id.to_hex());
}
