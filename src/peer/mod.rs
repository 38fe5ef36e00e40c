//! Peer session seam
//!
//! The WebRTC peer-connection library is injected through [`PeerConnector`].
//! A session is created in initiator or responder mode, is fed remote
//! signaling data through [`PeerSession::signal`], and reports back through
//! the [`PeerEventSink`] it was created with.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::media::{MediaStream, MediaTrack};
use crate::models::SignalData;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeerError {
    #[error("Peer construction failed: {0}")]
    Construction(String),
    #[error("Invalid signaling data: {0}")]
    InvalidSignal(String),
    #[error("Track error: {0}")]
    Track(String),
    #[error("Peer session closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Creates the offer (caller)
    Initiator,
    /// Consumes the offer and produces the answer (receiver)
    Responder,
}

/// Callbacks raised by a peer session
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Local signaling data to forward to the other party
    Signal(SignalData),
    /// Remote media arrived
    RemoteStream(MediaStream),
    /// Media path established
    Connected,
    /// The connection closed
    Closed,
    /// Unrecoverable library error
    Error(String),
}

/// Where a peer session delivers its events. Each sink is stamped with the
/// call attempt that created it so events from a torn-down session can be
/// told apart from the live one.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    attempt: u64,
    tx: mpsc::UnboundedSender<(u64, PeerEvent)>,
}

impl PeerEventSink {
    pub fn new(attempt: u64, tx: mpsc::UnboundedSender<(u64, PeerEvent)>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Deliver an event; returns false once the orchestrator is gone
    pub fn emit(&self, event: PeerEvent) -> bool {
        self.tx.send((self.attempt, event)).is_ok()
    }
}

/// One end of a direct media connection
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Feed remote signaling data (offer, answer or ICE candidate)
    async fn signal(&self, data: SignalData) -> Result<(), PeerError>;

    /// Whether an outbound video sender already exists on the connection
    fn has_video_sender(&self) -> bool;

    /// Swap the track behind the existing outbound video sender
    async fn replace_video_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), PeerError>;

    /// Add a new outbound track; may trigger renegotiation
    async fn add_track(&self, track: Arc<dyn MediaTrack>, stream: &MediaStream) -> Result<(), PeerError>;

    /// Close the connection and release its resources
    fn destroy(&self);
}

#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        role: PeerRole,
        stream: MediaStream,
        events: PeerEventSink,
    ) -> Result<Box<dyn PeerSession>, PeerError>;
}
