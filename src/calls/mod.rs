//! Call orchestration
//!
//! [`CallController`] owns the call state for one signed-in user. It places
//! and answers calls, relays signaling payloads between the peer session and
//! the signaling channel, controls local tracks and writes the call history.
//!
//! The controller is driven from a single task ([`CallController::run`])
//! that multiplexes UI commands, signaling frames, peer events and the
//! delayed reset to idle. UI code talks to it through a [`CallHandle`].

pub mod history;

#[cfg(test)]
pub(crate) mod testing;

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError};
use crate::config::ClientConfig;
use crate::media::{acquire_local_media, MediaConstraints, MediaDevices, MediaError, TrackKind};
use crate::models::{
    AnswerCallPayload, CallStatus, CallType, CallUserPayload, ClientEvent, Envelope, LogCallRequest,
    OutgoingCandidatePayload, OutgoingEndCallPayload, ServerEvent, SignalData, UpdateCallRequest,
};
use crate::peer::{PeerConnector, PeerError, PeerEvent, PeerEventSink, PeerRole};
use crate::signaling::{SignalingChannel, SignalingError, SignalingSocket};
use crate::state::{CallDirection, CallPhase, CallPhaseKind, CallSession, CallView, MediaState, PeerLink};
use crate::tones::{self, ToneKind, TonePlayer};

use history::{CallHistory, HistoryTarget, RestCallHistory};

/// Commands queued per controller before senders wait
const COMMAND_CAPACITY: usize = 32;

#[derive(Error, Debug)]
pub enum CallError {
    #[error("Already in a call")]
    Busy,
    #[error("No call in progress")]
    NoActiveCall,
    #[error("Operation not allowed while {0:?}")]
    InvalidState(CallPhaseKind),
    #[error("Cannot call user {0}")]
    InvalidTarget(i64),
    #[error("Media error: {0}")]
    Media(#[from] MediaError),
    #[error("Peer error: {0}")]
    Peer(#[from] PeerError),
    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Call controller stopped")]
    ControllerStopped,
}

/// Identity of the signed-in user and call timing
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub user_id: i64,
    pub user_name: String,
    /// How long the ended phase lasts before returning to idle
    pub reset_delay: Duration,
}

impl From<&ClientConfig> for CallSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            user_id: config.user_id,
            user_name: config.user_name.clone(),
            reset_delay: config.reset_delay,
        }
    }
}

/// Runtime services the controller drives
#[derive(Clone)]
pub struct CallDependencies {
    pub signaling: Arc<dyn SignalingChannel>,
    pub connector: Arc<dyn PeerConnector>,
    pub devices: Arc<dyn MediaDevices>,
    pub history: Arc<dyn CallHistory>,
    pub tones: Arc<dyn TonePlayer>,
}

pub struct CallController {
    settings: CallSettings,
    deps: CallDependencies,
    phase: CallPhase,
    /// Incremented for every call placed or received
    attempt: u64,
    local_peer_id: Option<String>,
    peer_tx: mpsc::UnboundedSender<(u64, PeerEvent)>,
    peer_rx: mpsc::UnboundedReceiver<(u64, PeerEvent)>,
    reset_tx: mpsc::UnboundedSender<u64>,
    reset_rx: mpsc::UnboundedReceiver<u64>,
    view: watch::Sender<CallView>,
}

impl CallController {
    pub fn new(settings: CallSettings, deps: CallDependencies) -> Self {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();
        let (view, _) = watch::channel(CallView::default());

        Self {
            settings,
            deps,
            phase: CallPhase::Idle,
            attempt: 0,
            local_peer_id: None,
            peer_tx,
            peer_rx,
            reset_tx,
            reset_rx,
            view,
        }
    }

    /// Peer id assigned by the relay, if the greeting was seen
    pub fn with_peer_id(mut self, peer_id: Option<String>) -> Self {
        self.local_peer_id = peer_id;
        self
    }

    pub fn phase(&self) -> CallPhaseKind {
        self.phase.kind()
    }

    pub fn view(&self) -> CallView {
        CallView::from_phase(&self.phase)
    }

    pub fn subscribe(&self) -> watch::Receiver<CallView> {
        self.view.subscribe()
    }

    fn publish(&self) {
        self.view.send_replace(CallView::from_phase(&self.phase));
    }

    // ============== Placing a call ==============

    /// Call another user. Returns once the peer session exists; the offer is
    /// forwarded when the session produces it.
    pub async fn call_user(&mut self, target_id: i64, target_name: &str, wants_video: bool) -> Result<(), CallError> {
        if !self.phase.is_available() {
            return Err(CallError::Busy);
        }
        if target_id == self.settings.user_id {
            return Err(CallError::InvalidTarget(target_id));
        }

        self.attempt += 1;
        let attempt = self.attempt;
        tracing::info!("Calling user {} (video: {}, attempt {})", target_id, wants_video, attempt);

        let mut session = CallSession::new(
            attempt,
            target_id,
            target_name.to_string(),
            CallDirection::Outgoing,
            MediaState { video: wants_video, audio: true },
        );
        session.local_peer_id = self.local_peer_id.clone();

        let request = LogCallRequest {
            receiver_id: target_id,
            call_type: CallType::from_video(wants_video),
            status: CallStatus::Initiated,
        };
        session.history_id = match self.deps.history.log_call(&request).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Failed to log call to user {}: {}", target_id, e);
                None
            }
        };

        self.phase = CallPhase::Dialing(session);
        self.publish();

        let media = match acquire_local_media(self.deps.devices.as_ref(), wants_video).await {
            Ok(media) => media,
            Err(e) => {
                tracing::warn!("Could not acquire media for call to {}: {}", target_id, e);
                self.abandon_attempt().await;
                return Err(e.into());
            }
        };

        self.deps.tones.start(ToneKind::Dial);

        let sink = PeerEventSink::new(attempt, self.peer_tx.clone());
        let peer = match self.deps.connector.connect(PeerRole::Initiator, media.stream.clone(), sink).await {
            Ok(peer) => peer,
            Err(e) => {
                tracing::warn!("Failed to create peer session: {}", e);
                media.stream.stop_all();
                self.abandon_attempt().await;
                return Err(e.into());
            }
        };

        if let Some(session) = self.phase.session_mut() {
            session.media.video = media.video;
            session.attach(PeerLink::new(peer, media.stream));
        }
        self.publish();
        Ok(())
    }

    // ============== Answering ==============

    pub async fn answer_call(&mut self) -> Result<(), CallError> {
        let (mut session, offer, pending_candidates) = match mem::replace(&mut self.phase, CallPhase::Idle) {
            CallPhase::Ringing { session, offer, pending_candidates } => (session, offer, pending_candidates),
            other => {
                let kind = other.kind();
                self.phase = other;
                return Err(match kind {
                    CallPhaseKind::Idle | CallPhaseKind::Ended => CallError::NoActiveCall,
                    _ => CallError::InvalidState(kind),
                });
            }
        };

        self.deps.tones.stop();
        tracing::info!("Answering call from user {}", session.remote_user_id);

        // Match the offer exactly; an audio-only offer never asks for the camera
        let media = match acquire_local_media(self.deps.devices.as_ref(), session.media.video).await {
            Ok(media) => media,
            Err(e) => {
                tracing::warn!("Could not acquire media to answer: {}", e);
                self.phase = CallPhase::Ringing { session, offer, pending_candidates };
                self.leave_call().await?;
                return Err(e.into());
            }
        };
        session.media.video = media.video;

        let sink = PeerEventSink::new(session.attempt, self.peer_tx.clone());
        let peer = match self.deps.connector.connect(PeerRole::Responder, media.stream.clone(), sink).await {
            Ok(peer) => peer,
            Err(e) => {
                tracing::warn!("Failed to create peer session: {}", e);
                media.stream.stop_all();
                self.phase = CallPhase::Ringing { session, offer, pending_candidates };
                self.leave_call().await?;
                return Err(e.into());
            }
        };

        let link = PeerLink::new(peer, media.stream);
        if let Err(e) = link.peer.signal(offer.clone()).await {
            tracing::warn!("Peer rejected the offer: {}", e);
            session.attach(link);
            self.phase = CallPhase::Ringing { session, offer, pending_candidates };
            self.leave_call().await?;
            return Err(e.into());
        }

        for candidate in pending_candidates {
            if let Err(e) = link.peer.signal(candidate).await {
                tracing::warn!("Dropping buffered ICE candidate: {}", e);
            }
        }

        session.attach(link);
        self.phase = CallPhase::Active(session);
        self.publish();
        Ok(())
    }

    // ============== Hanging up ==============

    /// End the call from the local side and record its outcome
    pub async fn leave_call(&mut self) -> Result<(), CallError> {
        let status = self.phase.leave_status().ok_or(CallError::NoActiveCall)?;
        let (session, duration) = self.end_session(status).ok_or(CallError::NoActiveCall)?;

        let remote = session.remote_user_id;
        let end = ClientEvent::EndCall(OutgoingEndCallPayload { to: remote });
        if let Err(e) = self.deps.signaling.emit(end).await {
            tracing::warn!("Failed to send end-call to user {}: {}", remote, e);
        }

        self.record_outcome(&session, status, duration).await;
        Ok(())
    }

    /// Record a failed outgoing attempt; the remote side never saw an offer
    async fn abandon_attempt(&mut self) {
        if let Some((session, _)) = self.end_session(CallStatus::Missed) {
            self.record_outcome(&session, CallStatus::Missed, 0).await;
        }
    }

    /// Tear the current call down locally and move to the ended phase.
    /// Returns the finished session and its billable duration.
    fn end_session(&mut self, status: CallStatus) -> Option<(CallSession, i32)> {
        let session = match mem::replace(&mut self.phase, CallPhase::Idle) {
            CallPhase::Dialing(session) | CallPhase::Active(session) => session,
            CallPhase::Ringing { session, .. } => session,
            other => {
                self.phase = other;
                return None;
            }
        };

        self.deps.tones.stop();
        session.teardown();

        let duration_secs = if status == CallStatus::Completed { session.elapsed_secs() } else { 0 };
        tracing::info!(
            "Call with user {} ended: {} ({}s)",
            session.remote_user_id,
            status.as_str(),
            duration_secs
        );

        self.phase = CallPhase::Ended {
            remote_user_id: session.remote_user_id,
            remote_name: session.remote_name.clone(),
            status,
            duration_secs,
        };
        self.publish();
        self.schedule_reset();
        Some((session, duration_secs))
    }

    async fn record_outcome(&self, session: &CallSession, status: CallStatus, duration: i32) {
        let target = match (session.history_id, session.direction) {
            (Some(id), _) => HistoryTarget::Id(id),
            (None, CallDirection::Outgoing) => HistoryTarget::Users {
                caller_id: self.settings.user_id,
                receiver_id: session.remote_user_id,
            },
            (None, CallDirection::Incoming) => HistoryTarget::Users {
                caller_id: session.remote_user_id,
                receiver_id: self.settings.user_id,
            },
        };

        let update = UpdateCallRequest { status, duration };
        if let Err(e) = self.deps.history.update_call(target, &update).await {
            tracing::warn!("Failed to record {} call: {}", status.as_str(), e);
        }
    }

    fn schedule_reset(&mut self) {
        let delay = self.settings.reset_delay;
        if delay.is_zero() {
            self.phase = CallPhase::Idle;
            self.publish();
            return;
        }

        let attempt = self.attempt;
        let reset_tx = self.reset_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = reset_tx.send(attempt);
        });
    }

    fn handle_reset(&mut self, attempt: u64) {
        // A newer call owns the state now
        if attempt == self.attempt && matches!(self.phase, CallPhase::Ended { .. }) {
            self.phase = CallPhase::Idle;
            self.publish();
        }
    }

    // ============== Track control ==============

    /// Turn local video on or off; returns the new state. Turning video on
    /// for a call that started audio-only acquires the camera.
    pub async fn toggle_video(&mut self) -> Result<bool, CallError> {
        let devices = self.deps.devices.clone();
        let session = self.phase.session_mut().ok_or(CallError::NoActiveCall)?;
        let link = session.link.as_mut().ok_or(CallError::NoActiveCall)?;

        if link.local_stream.has_video() {
            let enabled = !session.media.video;
            link.local_stream.set_enabled(TrackKind::Video, enabled);
            session.media.video = enabled;
            self.publish();
            return Ok(enabled);
        }

        let camera = devices.get_user_media(MediaConstraints::camera_only()).await?;
        let track = camera
            .video_tracks()
            .next()
            .cloned()
            .ok_or_else(|| MediaError::NotFound("camera returned no video track".to_string()))?;

        let sent = if link.peer.has_video_sender() {
            link.peer.replace_video_track(track.clone()).await
        } else {
            link.peer.add_track(track.clone(), &link.local_stream).await
        };
        if let Err(e) = sent {
            tracing::warn!("Video upgrade failed: {}", e);
            track.stop();
            return Err(e.into());
        }
        link.local_stream.add_track(track);
        session.media.video = true;
        tracing::info!("Video upgraded for call with user {}", session.remote_user_id);

        self.publish();
        Ok(true)
    }

    /// Mute or unmute the microphone; returns the new state
    pub async fn toggle_audio(&mut self) -> Result<bool, CallError> {
        let session = self.phase.session_mut().ok_or(CallError::NoActiveCall)?;
        let link = session.link.as_ref().ok_or(CallError::NoActiveCall)?;

        let enabled = !session.media.audio;
        link.local_stream.set_enabled(TrackKind::Audio, enabled);
        session.media.audio = enabled;

        self.publish();
        Ok(enabled)
    }

    // ============== Signaling events ==============

    pub async fn handle_envelope(&mut self, envelope: &Envelope) {
        match ServerEvent::from_envelope(envelope) {
            Ok(Some(event)) => self.handle_server_event(event).await,
            Ok(None) => {}
            Err(e) => tracing::warn!("Malformed {} event: {}", envelope.event, e),
        }
    }

    pub async fn handle_server_event(&mut self, event: ServerEvent) {
        if let Some(sender) = event.sender() {
            if !self.is_current_party(sender) && !matches!(event, ServerEvent::CallMade(_)) {
                tracing::debug!("Ignoring {} from user {} (not in call)", event.event_name(), sender);
                return;
            }
        }

        match event {
            ServerEvent::Connected(greeting) => {
                tracing::debug!("Signaling peer id {}", greeting.id);
                self.local_peer_id = Some(greeting.id);
            }
            ServerEvent::CallMade(call) => self.on_call_made(call.from, call.name, call.signal, call.is_video_call).await,
            ServerEvent::CallAnswered(answer) => self.on_call_answered(answer.signal).await,
            ServerEvent::IceCandidate(candidate) => self.on_remote_candidate(candidate.candidate).await,
            ServerEvent::EndCall(_) => self.on_remote_end(),
        }
    }

    fn is_current_party(&self, user_id: i64) -> bool {
        self.phase
            .session()
            .map(|s| s.remote_user_id == user_id)
            .unwrap_or(false)
    }

    async fn on_call_made(&mut self, from: i64, name: String, offer: SignalData, is_video: bool) {
        if from == self.settings.user_id {
            return;
        }

        if !self.phase.is_available() {
            if matches!(self.phase, CallPhase::Ringing { .. }) && self.is_current_party(from) {
                tracing::debug!("Duplicate offer from user {} ignored", from);
                return;
            }

            tracing::info!("Rejecting call from user {}: busy", from);
            let end = ClientEvent::EndCall(OutgoingEndCallPayload { to: from });
            if let Err(e) = self.deps.signaling.emit(end).await {
                tracing::warn!("Failed to reject call from user {}: {}", from, e);
            }
            let target = HistoryTarget::Users {
                caller_id: from,
                receiver_id: self.settings.user_id,
            };
            let update = UpdateCallRequest {
                status: CallStatus::Missed,
                duration: 0,
            };
            if let Err(e) = self.deps.history.update_call(target, &update).await {
                tracing::warn!("Failed to record rejected call: {}", e);
            }
            return;
        }

        self.attempt += 1;
        tracing::info!("Incoming {} call from {} ({})", CallType::from_video(is_video).as_str(), name, from);

        let mut session = CallSession::new(
            self.attempt,
            from,
            name,
            CallDirection::Incoming,
            MediaState { video: is_video, audio: true },
        );
        session.local_peer_id = self.local_peer_id.clone();

        self.phase = CallPhase::Ringing {
            session,
            offer,
            pending_candidates: Vec::new(),
        };
        self.deps.tones.start(ToneKind::Ring);
        self.publish();
    }

    async fn on_call_answered(&mut self, answer: SignalData) {
        let session = match mem::replace(&mut self.phase, CallPhase::Idle) {
            CallPhase::Dialing(session) => session,
            other => {
                tracing::debug!("Ignoring answer while {:?}", other.kind());
                self.phase = other;
                return;
            }
        };

        self.deps.tones.stop();
        let result = match &session.link {
            Some(link) => link.peer.signal(answer).await,
            None => Err(PeerError::Closed),
        };

        self.phase = CallPhase::Dialing(session);
        if let Err(e) = result {
            tracing::warn!("Peer rejected the answer: {}", e);
            if let Err(e) = self.leave_call().await {
                tracing::debug!("Leave after failed answer: {}", e);
            }
            return;
        }

        if let CallPhase::Dialing(session) = mem::replace(&mut self.phase, CallPhase::Idle) {
            tracing::info!("Call accepted by user {}", session.remote_user_id);
            self.phase = CallPhase::Active(session);
        }
        self.publish();
    }

    async fn on_remote_candidate(&mut self, candidate: SignalData) {
        match &mut self.phase {
            CallPhase::Ringing { pending_candidates, .. } => pending_candidates.push(candidate),
            CallPhase::Dialing(session) | CallPhase::Active(session) => match &session.link {
                Some(link) => {
                    if let Err(e) = link.peer.signal(candidate).await {
                        tracing::warn!("Failed to apply ICE candidate: {}", e);
                    }
                }
                None => tracing::debug!("ICE candidate before peer session, dropped"),
            },
            CallPhase::Idle | CallPhase::Ended { .. } => tracing::debug!("ICE candidate outside a call, dropped"),
        }
    }

    /// The other party hung up: clean up without signaling back or writing history
    fn on_remote_end(&mut self) {
        let status = match &self.phase {
            CallPhase::Active(_) => CallStatus::Completed,
            CallPhase::Dialing(_) => CallStatus::Declined,
            CallPhase::Ringing { .. } => CallStatus::Missed,
            CallPhase::Idle | CallPhase::Ended { .. } => return,
        };
        tracing::info!("Remote party ended the call");
        self.end_session(status);
    }

    // ============== Peer events ==============

    pub async fn handle_peer_event(&mut self, attempt: u64, event: PeerEvent) {
        let live = self
            .phase
            .session()
            .map(|s| s.attempt == attempt && s.link.is_some())
            .unwrap_or(false);
        if !live {
            tracing::debug!("Dropping {:?} from stale peer session (attempt {})", event, attempt);
            return;
        }

        match event {
            PeerEvent::Signal(data) => self.forward_signal(data).await,
            PeerEvent::RemoteStream(stream) => {
                if let Some(link) = self.phase.session_mut().and_then(|s| s.link.as_mut()) {
                    link.remote_stream = Some(stream);
                }
                self.publish();
            }
            PeerEvent::Connected => tracing::info!("Peer connection established"),
            PeerEvent::Closed | PeerEvent::Error(_) => {
                tracing::warn!("Peer session failed: {:?}", event);
                if let Err(e) = self.leave_call().await {
                    tracing::debug!("Leave after peer failure: {}", e);
                }
            }
        }
    }

    /// The first payload of a session is the offer or answer; every later one
    /// is an ICE candidate
    async fn forward_signal(&mut self, data: SignalData) {
        let user_id = self.settings.user_id;
        let user_name = self.settings.user_name.clone();

        let Some(session) = self.phase.session_mut() else {
            return;
        };
        let remote = session.remote_user_id;
        let direction = session.direction;
        let video = session.media.video;
        let Some(link) = session.link.as_mut() else {
            return;
        };

        let event = if link.signal_sent {
            ClientEvent::IceCandidate(OutgoingCandidatePayload { candidate: data, to: remote })
        } else {
            link.signal_sent = true;
            match direction {
                CallDirection::Outgoing => ClientEvent::CallUser(CallUserPayload {
                    user_to_call: remote,
                    signal_data: data,
                    from: user_id,
                    name: user_name,
                    is_video_call: video,
                }),
                CallDirection::Incoming => ClientEvent::AnswerCall(AnswerCallPayload { signal: data, to: remote }),
            }
        };

        let name = event.event_name();
        if let Err(e) = self.deps.signaling.emit(event).await {
            tracing::warn!("Failed to send {} to user {}: {}", name, remote, e);
        }
    }

    // ============== Driving ==============

    /// Serve commands and events until every [`CallHandle`] is dropped
    pub async fn run(mut self, mut commands: mpsc::Receiver<CallCommand>, mut frames: broadcast::Receiver<Envelope>) {
        let mut frames_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                frame = frames.recv(), if frames_open => match frame {
                    Ok(envelope) => self.handle_envelope(&envelope).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Call controller lagged, {} signaling frames skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("Signaling channel closed");
                        frames_open = false;
                    }
                },
                Some((attempt, event)) = self.peer_rx.recv() => self.handle_peer_event(attempt, event).await,
                Some(attempt) = self.reset_rx.recv() => self.handle_reset(attempt),
            }
        }

        if self.phase.session().is_some() {
            if let Err(e) = self.leave_call().await {
                tracing::debug!("Leave on shutdown: {}", e);
            }
        }
        tracing::info!("Call controller stopped");
    }

    /// Run the controller on its own task
    pub fn spawn(self, frames: broadcast::Receiver<Envelope>) -> (CallHandle, JoinHandle<()>) {
        let (commands, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = CallHandle {
            commands,
            view: self.subscribe(),
        };
        let task = tokio::spawn(self.run(commands_rx, frames));
        (handle, task)
    }

    async fn handle_command(&mut self, command: CallCommand) {
        match command {
            CallCommand::CallUser { target_id, target_name, video, reply } => {
                let _ = reply.send(self.call_user(target_id, &target_name, video).await);
            }
            CallCommand::Answer { reply } => {
                let _ = reply.send(self.answer_call().await);
            }
            CallCommand::Leave { reply } => {
                let _ = reply.send(self.leave_call().await);
            }
            CallCommand::ToggleVideo { reply } => {
                let _ = reply.send(self.toggle_video().await);
            }
            CallCommand::ToggleAudio { reply } => {
                let _ = reply.send(self.toggle_audio().await);
            }
        }
    }

    /// Handle every peer event and reset that is already queued
    #[cfg(test)]
    pub(crate) async fn process_pending(&mut self) {
        loop {
            if let Ok((attempt, event)) = self.peer_rx.try_recv() {
                self.handle_peer_event(attempt, event).await;
                continue;
            }
            if let Ok(attempt) = self.reset_rx.try_recv() {
                self.handle_reset(attempt);
                continue;
            }
            break;
        }
    }
}

pub enum CallCommand {
    CallUser {
        target_id: i64,
        target_name: String,
        video: bool,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    Answer {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    Leave {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    ToggleVideo {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
    ToggleAudio {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
}

/// Cloneable front end of a running [`CallController`]
#[derive(Clone)]
pub struct CallHandle {
    commands: mpsc::Sender<CallCommand>,
    view: watch::Receiver<CallView>,
}

impl CallHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, CallError>>) -> CallCommand,
    ) -> Result<T, CallError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| CallError::ControllerStopped)?;
        response.await.map_err(|_| CallError::ControllerStopped)?
    }

    pub async fn call_user(&self, target_id: i64, target_name: &str, video: bool) -> Result<(), CallError> {
        let target_name = target_name.to_string();
        self.request(|reply| CallCommand::CallUser { target_id, target_name, video, reply })
            .await
    }

    pub async fn answer_call(&self) -> Result<(), CallError> {
        self.request(|reply| CallCommand::Answer { reply }).await
    }

    pub async fn leave_call(&self) -> Result<(), CallError> {
        self.request(|reply| CallCommand::Leave { reply }).await
    }

    pub async fn toggle_video(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleVideo { reply }).await
    }

    pub async fn toggle_audio(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleAudio { reply }).await
    }

    /// Latest state snapshot
    pub fn view(&self) -> CallView {
        self.view.borrow().clone()
    }

    /// Watch state changes
    pub fn watch(&self) -> watch::Receiver<CallView> {
        self.view.clone()
    }
}

/// A running call client: the controller task and the socket it reads from
pub struct CallClient {
    pub handle: CallHandle,
    pub socket: SignalingSocket,
    pub task: JoinHandle<()>,
}

impl CallClient {
    /// Hang up any call in progress and wait for the controller to stop.
    /// The controller exits once every [`CallHandle`] is dropped, so clones
    /// handed out elsewhere must be gone before this returns.
    pub async fn shutdown(self) {
        let CallClient { handle, socket, task } = self;
        drop(handle);
        if let Err(e) = task.await {
            tracing::warn!("Call controller task failed: {}", e);
        }
        socket.close();
    }
}

/// Connect the signaling socket for the configured user and start a call
/// controller on it. The host supplies the peer library and media devices.
pub async fn start_client(
    config: &ClientConfig,
    connector: Arc<dyn PeerConnector>,
    devices: Arc<dyn MediaDevices>,
) -> Result<CallClient, CallError> {
    let socket = SignalingSocket::connect(&config.signaling_url, &config.token).await?;
    let api = ApiClient::with_token(&config.api_url, &config.token)?;

    let controller = CallController::new(
        CallSettings::from(config),
        CallDependencies {
            signaling: Arc::new(socket.clone()),
            connector,
            devices,
            history: Arc::new(RestCallHistory::new(api)),
            tones: tones::default_player(),
        },
    )
    .with_peer_id(socket.peer_id().map(str::to_string));

    let (handle, task) = controller.spawn(socket.subscribe());
    tracing::info!("Call client ready for user {}", config.user_id);
    Ok(CallClient { handle, socket, task })
}
