//! In-process fakes for the call orchestrator's seams

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::history::{CallHistory, HistoryTarget};
use super::{CallController, CallDependencies, CallSettings};
use crate::api::ApiError;
use crate::media::{MediaConstraints, MediaDevices, MediaError, MediaStream, MediaTrack, TrackKind};
use crate::models::{ClientEvent, LogCallRequest, SignalData, UpdateCallRequest};
use crate::peer::{PeerConnector, PeerError, PeerEvent, PeerEventSink, PeerRole, PeerSession};
use crate::signaling::{SignalingChannel, SignalingError};
use crate::tones::{ToneKind, TonePlayer};

// ============== Media ==============

#[derive(Debug)]
pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    live: AtomicBool,
}

impl FakeTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
        })
    }

    pub fn audio() -> Arc<Self> {
        Self::new(TrackKind::Audio)
    }

    pub fn video() -> Arc<Self> {
        Self::new(TrackKind::Video)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Devices with a configurable camera and microphone
pub struct FakeDevices {
    camera: bool,
    microphone: bool,
    requests: Mutex<Vec<MediaConstraints>>,
    produced: Mutex<Vec<Arc<FakeTrack>>>,
}

impl Default for FakeDevices {
    fn default() -> Self {
        Self::with(true, true)
    }
}

impl FakeDevices {
    fn with(camera: bool, microphone: bool) -> Self {
        Self {
            camera,
            microphone,
            requests: Mutex::new(Vec::new()),
            produced: Mutex::new(Vec::new()),
        }
    }

    pub fn without_camera() -> Self {
        Self::with(false, true)
    }

    pub fn without_any_device() -> Self {
        Self::with(false, false)
    }

    pub fn requests(&self) -> Vec<MediaConstraints> {
        self.requests.lock().unwrap().clone()
    }

    /// Every track handed out so far
    pub fn tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.produced.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_user_media(&self, constraints: MediaConstraints) -> Result<MediaStream, MediaError> {
        self.requests.lock().unwrap().push(constraints);

        if constraints.video && !self.camera {
            return Err(MediaError::NotFound("camera".to_string()));
        }
        if constraints.audio && !self.microphone {
            return Err(MediaError::NotFound("microphone".to_string()));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(FakeTrack::audio());
        }
        if constraints.video {
            tracks.push(FakeTrack::video());
        }
        self.produced.lock().unwrap().extend(tracks.iter().cloned());

        Ok(MediaStream::new(
            tracks.into_iter().map(|t| t as Arc<dyn MediaTrack>).collect(),
        ))
    }
}

// ============== Signaling ==============

#[derive(Default)]
pub struct FakeSignaling {
    sent: Mutex<Vec<ClientEvent>>,
}

impl FakeSignaling {
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl SignalingChannel for FakeSignaling {
    async fn emit(&self, event: ClientEvent) -> Result<(), SignalingError> {
        self.sent.lock().unwrap().push(event);
        Ok(())
    }
}

// ============== Peer ==============

/// Observable state of one fake peer session
pub struct PeerRecord {
    pub role: PeerRole,
    pub sink: PeerEventSink,
    pub stream: MediaStream,
    signals: Mutex<Vec<SignalData>>,
    added: Mutex<Vec<Arc<dyn MediaTrack>>>,
    replaced: Mutex<Vec<Arc<dyn MediaTrack>>>,
    video_sender: AtomicBool,
    reject_tracks: bool,
    destroyed: AtomicBool,
}

impl PeerRecord {
    pub fn signals(&self) -> Vec<SignalData> {
        self.signals.lock().unwrap().clone()
    }

    pub fn added_tracks(&self) -> usize {
        self.added.lock().unwrap().len()
    }

    pub fn replaced_tracks(&self) -> usize {
        self.replaced.lock().unwrap().len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Raise an event as the peer library would
    pub fn emit(&self, event: PeerEvent) {
        self.sink.emit(event);
    }
}

struct FakePeer {
    record: Arc<PeerRecord>,
}

#[async_trait]
impl PeerSession for FakePeer {
    async fn signal(&self, data: SignalData) -> Result<(), PeerError> {
        if data.get("type").and_then(|t| t.as_str()) == Some("reject") {
            return Err(PeerError::InvalidSignal("rejected by fake".to_string()));
        }
        let is_offer = data.get("type").and_then(|t| t.as_str()) == Some("offer");
        self.record.signals.lock().unwrap().push(data);

        // A responder answers as soon as it has the offer
        if is_offer && self.record.role == PeerRole::Responder {
            self.record.emit(PeerEvent::Signal(json!({"type": "answer", "sdp": "fake-answer"})));
        }
        Ok(())
    }

    fn has_video_sender(&self) -> bool {
        self.record.video_sender.load(Ordering::SeqCst)
    }

    async fn replace_video_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), PeerError> {
        if self.record.reject_tracks {
            return Err(PeerError::Track("renegotiation failed".to_string()));
        }
        self.record.replaced.lock().unwrap().push(track);
        Ok(())
    }

    async fn add_track(&self, track: Arc<dyn MediaTrack>, _stream: &MediaStream) -> Result<(), PeerError> {
        if self.record.reject_tracks {
            return Err(PeerError::Track("renegotiation failed".to_string()));
        }
        if track.kind() == TrackKind::Video {
            self.record.video_sender.store(true, Ordering::SeqCst);
        }
        self.record.added.lock().unwrap().push(track);
        Ok(())
    }

    fn destroy(&self) {
        self.record.destroyed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakePeerConnector {
    peers: Mutex<Vec<Arc<PeerRecord>>>,
    fail: AtomicBool,
    video_sender: AtomicBool,
    reject_tracks: AtomicBool,
}

impl FakePeerConnector {
    /// New peers start with an outbound video sender even without a local
    /// video track, as a connection negotiated with a video transceiver does
    pub fn with_video_sender(&self) {
        self.video_sender.store(true, Ordering::SeqCst);
    }

    /// New peers refuse every added or replaced track
    pub fn reject_tracks(&self) {
        self.reject_tracks.store(true, Ordering::SeqCst);
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn peers(&self) -> Vec<Arc<PeerRecord>> {
        self.peers.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<PeerRecord> {
        self.peers.lock().unwrap().last().cloned().expect("no peer session created")
    }
}

#[async_trait]
impl PeerConnector for FakePeerConnector {
    async fn connect(
        &self,
        role: PeerRole,
        stream: MediaStream,
        events: PeerEventSink,
    ) -> Result<Box<dyn PeerSession>, PeerError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(PeerError::Construction("fake construction failure".to_string()));
        }

        let record = Arc::new(PeerRecord {
            role,
            sink: events,
            video_sender: AtomicBool::new(stream.has_video() || self.video_sender.load(Ordering::SeqCst)),
            reject_tracks: self.reject_tracks.load(Ordering::SeqCst),
            stream,
            signals: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            replaced: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });

        // An initiator produces its offer right away
        if role == PeerRole::Initiator {
            record.emit(PeerEvent::Signal(json!({"type": "offer", "sdp": "fake-offer"})));
        }

        self.peers.lock().unwrap().push(record.clone());
        Ok(Box::new(FakePeer { record }))
    }
}

// ============== History ==============

#[derive(Default)]
pub struct FakeHistory {
    logged: Mutex<Vec<LogCallRequest>>,
    updates: Mutex<Vec<(HistoryTarget, UpdateCallRequest)>>,
    next_id: AtomicI64,
    offline: AtomicBool,
    reject_logs: AtomicBool,
}

impl FakeHistory {
    /// Only `log_call` fails
    pub fn fail_logging(&self) {
        self.reject_logs.store(true, Ordering::SeqCst);
    }

    /// Every request fails with a network error
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn logged(&self) -> Vec<LogCallRequest> {
        self.logged.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(HistoryTarget, UpdateCallRequest)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallHistory for FakeHistory {
    async fn log_call(&self, request: &LogCallRequest) -> Result<i64, ApiError> {
        if self.offline.load(Ordering::SeqCst) || self.reject_logs.load(Ordering::SeqCst) {
            return Err(ApiError::Network("offline".to_string()));
        }
        self.logged.lock().unwrap().push(request.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn update_call(&self, target: HistoryTarget, update: &UpdateCallRequest) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Network("offline".to_string()));
        }
        self.updates.lock().unwrap().push((target, update.clone()));
        Ok(())
    }
}

// ============== Tones ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneEvent {
    Start(ToneKind),
    Stop,
}

#[derive(Default)]
pub struct RecordingTones {
    events: Mutex<Vec<ToneEvent>>,
}

impl RecordingTones {
    pub fn events(&self) -> Vec<ToneEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Tone currently playing, if any
    pub fn playing(&self) -> Option<ToneKind> {
        match self.events.lock().unwrap().last() {
            Some(ToneEvent::Start(kind)) => Some(*kind),
            _ => None,
        }
    }
}

impl TonePlayer for RecordingTones {
    fn start(&self, kind: ToneKind) {
        self.events.lock().unwrap().push(ToneEvent::Start(kind));
    }

    fn stop(&self) {
        self.events.lock().unwrap().push(ToneEvent::Stop);
    }
}

// ============== Harness ==============

/// A controller wired to fakes, plus handles on every fake
pub struct Harness {
    pub controller: CallController,
    pub signaling: Arc<FakeSignaling>,
    pub connector: Arc<FakePeerConnector>,
    pub devices: Arc<FakeDevices>,
    pub history: Arc<FakeHistory>,
    pub tones: Arc<RecordingTones>,
}

impl Harness {
    pub fn new(user_id: i64, user_name: &str) -> Self {
        Self::with_devices(user_id, user_name, FakeDevices::default())
    }

    pub fn with_devices(user_id: i64, user_name: &str, devices: FakeDevices) -> Self {
        Self::build(user_id, user_name, devices, Duration::ZERO)
    }

    pub fn build(user_id: i64, user_name: &str, devices: FakeDevices, reset_delay: Duration) -> Self {
        let signaling = Arc::new(FakeSignaling::default());
        let connector = Arc::new(FakePeerConnector::default());
        let devices = Arc::new(devices);
        let history = Arc::new(FakeHistory::default());
        let tones = Arc::new(RecordingTones::default());

        let controller = CallController::new(
            CallSettings {
                user_id,
                user_name: user_name.to_string(),
                reset_delay,
            },
            CallDependencies {
                signaling: signaling.clone(),
                connector: connector.clone(),
                devices: devices.clone(),
                history: history.clone(),
                tones: tones.clone(),
            },
        );

        Self {
            controller,
            signaling,
            connector,
            devices,
            history,
            tones,
        }
    }
}
