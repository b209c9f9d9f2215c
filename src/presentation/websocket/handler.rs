//! WebSocket Connection Handler
//!
//! Owns one socket's lifecycle: identity resolution at upgrade time,
//! presence registration, the read loop feeding the event dispatcher,
//! and cleanup on close.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::connection::OutboundFrame;
use super::dispatcher::ConnectionContext;
use crate::application::dto::Envelope;
use crate::infrastructure::cache::PresenceRegistry;
use crate::startup::AppState;

/// JWT claims for token validation
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Gateway query string; the token is optional. Connections without a
/// valid token stay anonymous and can only use presence and typing.
#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    token: Option<String>,
}

/// One inbound wire frame: `{"event": ..., "data": {...}}`.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<GatewayQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let user_id = query.token.as_deref().and_then(|token| {
        match validate_token(token, &state.settings.jwt.secret) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!(error = %e, "Token rejected, continuing anonymously");
                None
            }
        }
    });

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, addr))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Option<i64>, addr: SocketAddr) {
    let session_id = Uuid::new_v4().to_string();
    let ctx = ConnectionContext {
        session_id: session_id.clone(),
        user_id,
        remote_addr: addr.ip().to_string(),
    };
    let identity = ctx.identity();

    tracing::debug!(session_id = %session_id, identity = %identity, "New WebSocket connection");

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Channel for outgoing frames; also the delivery target for
    // notifications routed to this connection.
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    state.connections.register(session_id.clone(), tx.clone());

    // Forward queued frames onto the socket
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Register presence on open. A dead registry does not refuse the
    // socket; persistence-backed events still work.
    if let Err(e) = state.presence.connect(&identity, &session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "Presence registration failed");
    }

    // Main read loop
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame = match serde_json::from_str::<InboundFrame>(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        let envelope = Envelope::error(format!("malformed frame: {}", e));
                        let data = serde_json::to_value(&envelope).unwrap_or_default();
                        if tx.send(OutboundFrame::new("error", data)).is_err() {
                            break;
                        }
                        continue;
                    }
                };

                // Any activity keeps the presence entry alive.
                if let Err(e) = state.presence.refresh(&identity).await {
                    tracing::warn!(session_id = %session_id, error = %e, "Presence refresh failed");
                }

                // An omitted data field means an empty payload.
                let data = if frame.data.is_null() {
                    Value::Object(Default::default())
                } else {
                    frame.data
                };

                let response = state.dispatcher.dispatch(&frame.event, data, &ctx).await;
                if tx.send(response).is_err() {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!(session_id = %session_id, "Connection closed");
                break;
            }
            Some(Ok(Message::Ping(_))) => {
                // Pong is handled automatically by axum
            }
            Some(Err(e)) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    if let Err(e) = state.presence.disconnect(&identity).await {
        tracing::warn!(session_id = %session_id, error = %e, "Presence removal failed");
    }
    state.connections.unregister(&session_id);
    sender_task.abort();

    tracing::debug!(session_id = %session_id, identity = %identity, "Connection torn down");
}

/// Validate JWT token and return the user ID it names
fn validate_token(token: &str, secret: &str) -> Result<i64, String> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| format!("Invalid token: {}", e))?;

    token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|e| format!("Invalid user ID in token: {}", e))
}
