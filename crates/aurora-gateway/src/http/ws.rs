// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! WebSocket bridge — translates live-session WebSocket connections to the
//! internal [`ClientMessage`] / [`ServerMessage`] protocol and routes them
//! through [`GatewayService`].
//!
//! # Reliability
//!
//! A dropped connection does not kill the session: the outbound sender is
//! simply detached, and the running workflow (if any) keeps going in the
//! background. A client that reconnects and sends a fresh `query` or
//! `confirmation_response` against the same `session_id` re-attaches.
//!
//! # Rate limiting
//!
//! A `governor` token bucket keyed by `user_id` gates how fast frames from
//! one client are processed, independent of the HTTP-layer auth-failure
//! limiter in `http::auth`.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::control::protocol::{ClientMessage, ServerMessage};
use crate::http::AppState;

pub type ClientLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// Shared across every connection; 30 messages/minute per client id with a
/// burst of 10, matching the conservative defaults used for auth failures.
pub fn new_message_limiter() -> Arc<ClientLimiter> {
    let quota = Quota::per_minute(NonZeroU32::new(30).unwrap()).allow_burst(NonZeroU32::new(10).unwrap());
    Arc::new(RateLimiter::keyed(quota))
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_tx.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Tracks every session this connection has touched, so on disconnect we
    // detach our sender from each rather than tearing the session down.
    let mut touched_sessions: Vec<(Uuid, Uuid)> = Vec::new();

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    if let Some(client_id) = client_id_of(&msg) {
                        if state.message_limiter.check_key(&client_id.to_string()).is_err() {
                            let _ = out_tx.send(ServerMessage::error(None, "rate limit exceeded", Some("RATE_LIMITED")));
                            continue;
                        }
                    }
                    if let Some(key) = session_key_of(&msg) {
                        if !touched_sessions.contains(&key) {
                            touched_sessions.push(key);
                        }
                    }
                    state.gateway.dispatch(msg, &out_tx).await;
                }
                Err(e) => {
                    let _ = out_tx.send(ServerMessage::error(None, format!("invalid JSON frame: {e}"), Some("VALIDATION_ERROR")));
                }
            },
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {}
            Err(e) => {
                debug!("WebSocket recv error: {e}");
                break;
            }
        }
    }

    for key in touched_sessions {
        state.gateway.detach(key).await;
    }
    writer.abort();
    debug!("WebSocket connection closed");
}

fn client_id_of(msg: &ClientMessage) -> Option<Uuid> {
    match msg {
        ClientMessage::Init { user_id } => Some(*user_id),
        ClientMessage::Control { user_id, .. } => Some(*user_id),
        ClientMessage::ConfirmationResponse { user_id, .. } => Some(*user_id),
        ClientMessage::Query { user_id, .. } => Some(*user_id),
    }
}

fn session_key_of(msg: &ClientMessage) -> Option<(Uuid, Uuid)> {
    match msg {
        ClientMessage::Init { .. } => None,
        ClientMessage::Control { user_id, session_id, .. } => Some((*user_id, *session_id)),
        ClientMessage::ConfirmationResponse { user_id, session_id, .. } => Some((*user_id, *session_id)),
        ClientMessage::Query { user_id, session_id, .. } => Some((*user_id, *session_id)),
    }
}
