//! WebSocket signaling client
//!
//! Frames are read on a background task and fanned out to every subscriber
//! through a broadcast channel; writes are queued to a writer task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, http::HeaderValue, Message};
use tokio_util::sync::CancellationToken;

use super::{SignalingChannel, SignalingError};
use crate::models::{ClientEvent, Envelope, ServerEvent};

/// Frames buffered per subscriber before it starts lagging
const SUBSCRIBER_CAPACITY: usize = 256;

/// How long `connect` waits for the relay's greeting
const GREETING_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the shared signaling socket. Clones refer to the same connection.
#[derive(Clone)]
pub struct SignalingSocket {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: broadcast::Sender<Envelope>,
    peer_id: Option<Arc<str>>,
    cancel: CancellationToken,
}

impl SignalingSocket {
    /// Open the socket, authenticating with a bearer token
    pub async fn connect(url: &str, token: &str) -> Result<Self, SignalingError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| SignalingError::Connect(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| SignalingError::Connect(e.to_string()))?;
        request.headers_mut().insert("Authorization", bearer);

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SignalingError::Connect(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        // The relay greets every socket with the peer id it assigned
        let mut peer_id = None;
        match tokio::time::timeout(GREETING_TIMEOUT, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                match Envelope::from_json(text.as_str()).ok().and_then(|env| ServerEvent::from_envelope(&env).ok().flatten()) {
                    Some(ServerEvent::Connected(greeting)) => peer_id = Some(Arc::from(greeting.id)),
                    _ => tracing::debug!("First signaling frame was not a greeting"),
                }
            }
            Ok(Some(Err(e))) => return Err(SignalingError::Connect(e.to_string())),
            Ok(None) => return Err(SignalingError::Closed),
            Ok(Some(Ok(_))) => {}
            Err(_) => tracing::warn!("No greeting from signaling relay within {:?}", GREETING_TIMEOUT),
        }

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (incoming, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        let cancel = CancellationToken::new();

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    frame = outgoing_rx.recv() => match frame {
                        Some(text) => {
                            if let Err(e) = write.send(Message::text(text)).await {
                                tracing::warn!("Signaling write failed: {}", e);
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        });

        let reader_tx = incoming.clone();
        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    frame = read.next() => frame,
                };

                match frame {
                    Some(Ok(Message::Text(text))) => match Envelope::from_json(text.as_str()) {
                        Ok(envelope) => {
                            // No subscribers is fine; frames are not replayed
                            let _ = reader_tx.send(envelope);
                        }
                        Err(e) => tracing::warn!("Dropping malformed signaling frame: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Signaling read failed: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Signaling socket closed");
            reader_cancel.cancel();
        });

        tracing::info!("Signaling connected to {} (peer id {:?})", url, peer_id);

        Ok(Self {
            outgoing,
            incoming,
            peer_id,
            cancel,
        })
    }

    /// Peer id assigned by the relay on connect
    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    /// Listen to every frame arriving on the socket from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.incoming.subscribe()
    }

    /// Queue a raw frame (used by non-call features sharing the socket)
    pub fn send(&self, envelope: &Envelope) -> Result<(), SignalingError> {
        if self.cancel.is_cancelled() {
            return Err(SignalingError::Closed);
        }
        let text = envelope.to_json()?;
        self.outgoing.send(text).map_err(|_| SignalingError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl SignalingChannel for SignalingSocket {
    async fn emit(&self, event: ClientEvent) -> Result<(), SignalingError> {
        let envelope = event.to_envelope()?;
        tracing::debug!("Emitting {} to user {}", envelope.event, event.target());
        self.send(&envelope)
    }
}
