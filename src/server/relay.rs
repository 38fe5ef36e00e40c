//! Signaling relay
//!
//! Each authenticated WebSocket registers under its user id. Call events a
//! client sends are rewritten into their server-side form, stamped with the
//! authenticated sender and delivered to every live socket of the target
//! user. Nothing is queued for offline users.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::auth::{bearer_token, validate_token};
use super::AppState;
use crate::models::*;

type Connections = HashMap<i64, HashMap<Uuid, mpsc::UnboundedSender<String>>>;

/// Live sockets by user id. Cheap to clone.
#[derive(Clone, Default)]
pub struct Relay {
    connections: Arc<RwLock<Connections>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: i64) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(connection_id, tx);
        (connection_id, rx)
    }

    pub async fn unregister(&self, user_id: i64, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(sockets) = connections.get_mut(&user_id) {
            sockets.remove(&connection_id);
            if sockets.is_empty() {
                connections.remove(&user_id);
            }
        }
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.connections.read().await.contains_key(&user_id)
    }

    /// Send a frame to every socket of a user; returns how many took it
    pub async fn deliver(&self, user_id: i64, text: &str) -> usize {
        let connections = self.connections.read().await;
        connections
            .get(&user_id)
            .map(|sockets| sockets.values().filter(|tx| tx.send(text.to_string()).is_ok()).count())
            .unwrap_or(0)
    }

    /// Forward a client event from an authenticated sender
    pub async fn route(&self, sender: i64, event: ClientEvent) -> Result<usize, serde_json::Error> {
        let (target, forwarded) = forward(sender, event);
        let text = forwarded.to_envelope()?.to_json()?;

        let delivered = self.deliver(target, &text).await;
        if delivered == 0 {
            tracing::warn!(
                "Dropping {} from user {}: user {} is offline",
                forwarded.event_name(),
                sender,
                target
            );
        } else {
            tracing::debug!("Relayed {} from user {} to user {}", forwarded.event_name(), sender, target);
        }
        Ok(delivered)
    }
}

/// Rewrite a client event into what the target receives. The sender is the
/// authenticated user, never the `from` the client claimed.
pub fn forward(sender: i64, event: ClientEvent) -> (i64, ServerEvent) {
    match event {
        ClientEvent::CallUser(call) => (
            call.user_to_call,
            ServerEvent::CallMade(CallMadePayload {
                from: sender,
                name: call.name,
                signal: call.signal_data,
                is_video_call: call.is_video_call,
            }),
        ),
        ClientEvent::AnswerCall(answer) => (
            answer.to,
            ServerEvent::CallAnswered(CallAnsweredPayload {
                signal: answer.signal,
                from: Some(sender),
            }),
        ),
        ClientEvent::IceCandidate(candidate) => (
            candidate.to,
            ServerEvent::IceCandidate(IncomingCandidatePayload {
                candidate: candidate.candidate,
                from: Some(sender),
            }),
        ),
        ClientEvent::EndCall(end) => (end.to, ServerEvent::EndCall(IncomingEndCallPayload { from: Some(sender) })),
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// `GET /ws`: authenticate, then upgrade to the signaling socket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    let token = bearer_token(&headers).or(query.token.as_deref());
    let Some(token) = token else {
        return (StatusCode::UNAUTHORIZED, "Missing token").into_response();
    };

    let claims = match validate_token(token, &state.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Rejected signaling socket: {}", e);
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, relay, claims.sub))
}

async fn handle_socket(socket: WebSocket, relay: Relay, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut outbound) = relay.register(user_id).await;
    tracing::info!("User {} connected to signaling ({})", user_id, connection_id);

    let greeting = ServerEvent::Connected(ConnectedPayload { id: connection_id.to_string() });
    match greeting.to_envelope().and_then(|envelope| envelope.to_json()) {
        Ok(text) => {
            if sender.send(Message::Text(text.into())).await.is_err() {
                relay.unregister(user_id, connection_id).await;
                return;
            }
        }
        Err(e) => tracing::warn!("Failed to encode greeting: {}", e),
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let inbound_relay = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => handle_frame(&inbound_relay, user_id, text.as_str()).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Signaling socket error for user {}: {}", user_id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.unregister(user_id, connection_id).await;
    tracing::info!("User {} disconnected from signaling ({})", user_id, connection_id);
}

async fn handle_frame(relay: &Relay, user_id: i64, text: &str) {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Malformed frame from user {}: {}", user_id, e);
            return;
        }
    };

    match ClientEvent::from_envelope(&envelope) {
        Ok(Some(event)) => {
            if let Err(e) = relay.route(user_id, event).await {
                tracing::warn!("Failed to relay {}: {}", envelope.event, e);
            }
        }
        Ok(None) => tracing::debug!("Ignoring {} from user {}", envelope.event, user_id),
        Err(e) => tracing::warn!("Invalid {} payload from user {}: {}", envelope.event, user_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_forward_uses_authenticated_sender() {
        let event = ClientEvent::CallUser(CallUserPayload {
            user_to_call: 2,
            signal_data: json!({"type": "offer"}),
            from: 99,
            name: "Alice".to_string(),
            is_video_call: true,
        });

        let (target, forwarded) = forward(1, event);

        assert_eq!(target, 2);
        match forwarded {
            ServerEvent::CallMade(call) => {
                assert_eq!(call.from, 1);
                assert_eq!(call.name, "Alice");
                assert!(call.is_video_call);
            }
            other => panic!("expected call-made, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delivery_reaches_every_socket_of_a_user() {
        let relay = Relay::new();
        let (_, mut first) = relay.register(2).await;
        let (second_id, mut second) = relay.register(2).await;

        let end = ClientEvent::EndCall(OutgoingEndCallPayload { to: 2 });
        assert_eq!(relay.route(1, end).await.unwrap(), 2);

        let frame = Envelope::from_json(&first.recv().await.unwrap()).unwrap();
        assert_eq!(frame.event, EVENT_END_CALL);
        assert_eq!(frame.data["from"], 1);
        assert!(second.recv().await.is_some());

        relay.unregister(2, second_id).await;
        assert!(relay.is_online(2).await);
    }

    #[tokio::test]
    async fn test_offline_target_drops_event() {
        let relay = Relay::new();
        let (id, _rx) = relay.register(1).await;
        relay.unregister(1, id).await;

        let end = ClientEvent::EndCall(OutgoingEndCallPayload { to: 1 });
        assert_eq!(relay.route(2, end).await.unwrap(), 0);
        assert!(!relay.is_online(1).await);
    }
}
