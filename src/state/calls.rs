//! Call state
//!
//! The orchestrator owns exactly one [`CallPhase`]. Each phase variant carries
//! the data that only exists in that phase, so a transition is a single
//! replacement of the value.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::media::MediaStream;
use crate::models::{CallStatus, SignalData};
use crate::peer::PeerSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    /// We placed the call
    Outgoing,
    /// We received the call
    Incoming,
}

/// Track composition of the local side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaState {
    pub video: bool,
    pub audio: bool,
}

/// The live peer connection of a call and the local media feeding it
pub struct PeerLink {
    pub peer: Box<dyn PeerSession>,
    pub local_stream: MediaStream,
    pub remote_stream: Option<MediaStream>,
    /// The offer (caller) or answer (receiver) has been forwarded
    pub signal_sent: bool,
}

impl PeerLink {
    pub fn new(peer: Box<dyn PeerSession>, local_stream: MediaStream) -> Self {
        Self {
            peer,
            local_stream,
            remote_stream: None,
            signal_sent: false,
        }
    }

    /// Close the connection and release every local track
    pub fn teardown(&self) {
        self.peer.destroy();
        self.local_stream.stop_all();
    }
}

/// One call, from offer to teardown
pub struct CallSession {
    /// Call attempt counter value this session belongs to
    pub attempt: u64,
    /// Peer id assigned by the signaling channel
    pub local_peer_id: Option<String>,
    pub remote_user_id: i64,
    pub remote_name: String,
    pub direction: CallDirection,
    pub media: MediaState,
    /// Set when the peer session is created
    pub started_at: Option<Instant>,
    pub started_wall: Option<DateTime<Utc>>,
    /// History row id, known to the caller only
    pub history_id: Option<i64>,
    pub link: Option<PeerLink>,
}

impl CallSession {
    pub fn new(attempt: u64, remote_user_id: i64, remote_name: String, direction: CallDirection, media: MediaState) -> Self {
        Self {
            attempt,
            local_peer_id: None,
            remote_user_id,
            remote_name,
            direction,
            media,
            started_at: None,
            started_wall: None,
            history_id: None,
            link: None,
        }
    }

    /// Attach the peer session and start the call clock
    pub fn attach(&mut self, link: PeerLink) {
        self.started_at = Some(Instant::now());
        self.started_wall = Some(Utc::now());
        self.link = Some(link);
    }

    /// Whole seconds since the peer session was created (0 if never created)
    pub fn elapsed_secs(&self) -> i32 {
        self.started_at
            .map(|start| start.elapsed().as_secs().min(i32::MAX as u64) as i32)
            .unwrap_or(0)
    }

    pub fn teardown(&self) {
        if let Some(link) = &self.link {
            link.teardown();
        }
    }
}

/// Lifecycle phase of the orchestrator
pub enum CallPhase {
    Idle,
    /// Outgoing call placed, waiting for the answer
    Dialing(CallSession),
    /// Incoming offer stored, waiting for the local user
    Ringing {
        session: CallSession,
        offer: SignalData,
        /// Candidates that arrived before the peer session exists
        pending_candidates: Vec<SignalData>,
    },
    /// Call accepted by both sides
    Active(CallSession),
    /// Torn down; shown briefly before returning to idle
    Ended {
        remote_user_id: i64,
        remote_name: String,
        status: CallStatus,
        duration_secs: i32,
    },
}

impl CallPhase {
    pub fn kind(&self) -> CallPhaseKind {
        match self {
            CallPhase::Idle => CallPhaseKind::Idle,
            CallPhase::Dialing(_) => CallPhaseKind::Dialing,
            CallPhase::Ringing { .. } => CallPhaseKind::Ringing,
            CallPhase::Active(_) => CallPhaseKind::Active,
            CallPhase::Ended { .. } => CallPhaseKind::Ended,
        }
    }

    pub fn session(&self) -> Option<&CallSession> {
        match self {
            CallPhase::Dialing(session) | CallPhase::Active(session) => Some(session),
            CallPhase::Ringing { session, .. } => Some(session),
            CallPhase::Idle | CallPhase::Ended { .. } => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut CallSession> {
        match self {
            CallPhase::Dialing(session) | CallPhase::Active(session) => Some(session),
            CallPhase::Ringing { session, .. } => Some(session),
            CallPhase::Idle | CallPhase::Ended { .. } => None,
        }
    }

    /// A new call may start (ended calls are only waiting for the reset)
    pub fn is_available(&self) -> bool {
        matches!(self, CallPhase::Idle | CallPhase::Ended { .. })
    }

    /// Terminal history status if the call were left now, from the local side
    pub fn leave_status(&self) -> Option<CallStatus> {
        match self {
            CallPhase::Active(_) => Some(CallStatus::Completed),
            CallPhase::Ringing { .. } => Some(CallStatus::Declined),
            CallPhase::Dialing(_) => Some(CallStatus::Missed),
            CallPhase::Idle | CallPhase::Ended { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallPhaseKind {
    #[default]
    Idle,
    Dialing,
    Ringing,
    Active,
    Ended,
}

/// Read-only snapshot of the call state published to the UI
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallView {
    pub phase: CallPhaseKind,
    pub direction: Option<CallDirection>,
    pub remote_user_id: Option<i64>,
    pub remote_name: Option<String>,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    pub has_remote_stream: bool,
    pub started_at: Option<DateTime<Utc>>,
    /// Outcome of the last finished call, while the ended screen is shown
    pub last_status: Option<CallStatus>,
    pub last_duration_secs: Option<i32>,
}

impl CallView {
    pub fn from_phase(phase: &CallPhase) -> Self {
        match phase {
            CallPhase::Idle => CallView::default(),
            CallPhase::Ended { remote_user_id, remote_name, status, duration_secs } => CallView {
                phase: CallPhaseKind::Ended,
                remote_user_id: Some(*remote_user_id),
                remote_name: Some(remote_name.clone()),
                last_status: Some(*status),
                last_duration_secs: Some(*duration_secs),
                ..CallView::default()
            },
            _ => {
                let Some(session) = phase.session() else {
                    return CallView::default();
                };
                CallView {
                    phase: phase.kind(),
                    direction: Some(session.direction),
                    remote_user_id: Some(session.remote_user_id),
                    remote_name: Some(session.remote_name.clone()),
                    video_enabled: session.media.video,
                    audio_enabled: session.media.audio,
                    has_remote_stream: session
                        .link
                        .as_ref()
                        .map(|l| l.remote_stream.is_some())
                        .unwrap_or(false),
                    started_at: session.started_wall,
                    last_status: None,
                    last_duration_secs: None,
                }
            }
        }
    }

    pub fn is_in_call(&self) -> bool {
        matches!(self.phase, CallPhaseKind::Dialing | CallPhaseKind::Ringing | CallPhaseKind::Active)
    }
}
