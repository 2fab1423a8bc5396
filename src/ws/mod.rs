// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WebSocket connection gate and chat relay.
//!
//! Authentication happens once, at handshake time, with the same identity
//! and session guards the REST surface uses. The resulting
//! [`SessionContext`] is attached to the connection for its lifetime; no
//! per-message re-verification occurs. Revocation therefore only affects
//! *new* connections; an already-open socket lives until it closes
//! naturally.
//!
//! The relay itself is an in-process broadcast; message persistence belongs
//! to the downstream chat backend, not this gateway.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::auth::guard::bearer_token;
use crate::auth::{AuthError, SessionContext};
use crate::state::AppState;

/// Handshake auth data: browsers cannot set headers on WebSocket upgrades,
/// so the token may arrive as a query parameter instead.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// One chat message, as fanned out to every connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEnvelope {
    /// Sender wallet address.
    pub from: String,
    /// Whether the sender's session was VP-verified at connection time.
    pub vp_verified: bool,
    pub body: String,
    pub sent_at: i64,
}

/// `GET /ws/chat`: authenticate, then upgrade.
///
/// A token that fails either guard rejects the handshake with the same
/// uniform 401 the REST surface returns.
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AuthError> {
    let token = match query.token {
        Some(token) => token,
        None => bearer_token(&headers)?.to_string(),
    };

    let identity = state.identity_guard.verify_token(&token).await?;
    let session = state.session_guard.authorize(&token, &identity).await?;

    tracing::info!(
        address = %session.address,
        vp_verified = session.vp_verified,
        "websocket connection authenticated"
    );

    Ok(ws.on_upgrade(move |socket| chat_connection(socket, state, session)))
}

async fn chat_connection(socket: WebSocket, state: AppState, session: SessionContext) {
    let mut rx = state.chat.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let envelope = ChatEnvelope {
                        from: session.address.clone(),
                        vp_verified: session.vp_verified,
                        body: text.to_string(),
                        sent_at: chrono::Utc::now().timestamp(),
                    };
                    // Send only fails with zero receivers; we are one.
                    let _ = state.chat.send(envelope);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "websocket read failed");
                    break;
                }
            },
            outbound = rx.recv() => match outbound {
                Ok(envelope) => {
                    let Ok(json) = serde_json::to_string(&envelope) else { continue };
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(address = %session.address, skipped, "chat consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::debug!(address = %session.address, "websocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_camel_case() {
        let envelope = ChatEnvelope {
            from: "0xabc".to_string(),
            vp_verified: true,
            body: "hello".to_string(),
            sent_at: 1_700_000_000,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"vpVerified\":true"));
        assert!(json.contains("\"sentAt\":1700000000"));
    }

    #[test]
    fn auth_query_token_is_optional() {
        let query: WsAuthQuery = serde_json::from_str("{}").unwrap();
        assert!(query.token.is_none());

        let query: WsAuthQuery = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(query.token.as_deref(), Some("abc"));
    }
}
