//! Local media acquisition
//!
//! Camera and microphone access is provided by the runtime (browser shell or
//! desktop host) through [`MediaDevices`]. Tracks are shared handles: the
//! local stream and the peer session refer to the same track objects.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("No device available: {0}")]
    NotFound(String),
    #[error("Device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// What a `get_user_media` request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn audio_video() -> Self {
        Self { video: true, audio: true }
    }

    pub fn audio_only() -> Self {
        Self { video: false, audio: true }
    }

    pub fn camera_only() -> Self {
        Self { video: true, audio: false }
    }
}

/// A single capture track owned by the runtime
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    fn is_enabled(&self) -> bool;

    /// Mute/unmute without releasing the device
    fn set_enabled(&self, enabled: bool);

    /// Release the device. A stopped track never produces media again.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// A set of tracks. Clones share the same track handles.
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("tracks", &self.tracks.len())
            .field("audio", &self.audio_tracks().count())
            .field("video", &self.video_tracks().count())
            .finish()
    }
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn has_video(&self) -> bool {
        self.video_tracks().next().is_some()
    }

    pub fn add_track(&mut self, track: Arc<dyn MediaTrack>) {
        self.tracks.push(track);
    }

    /// Flip every track of `kind` to `enabled`; returns how many were touched
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> usize {
        let mut touched = 0;
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
            touched += 1;
        }
        touched
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.tracks.iter().all(|t| !t.is_live())
    }
}

/// Camera/microphone access
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: MediaConstraints) -> Result<MediaStream, MediaError>;
}

/// Local media for a call together with the video flag that actually applies
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub stream: MediaStream,
    pub video: bool,
}

/// Acquire local media for a call. Audio is always requested; when video was
/// asked for and the camera request fails, retry audio-only and report
/// `video = false`. A failing audio-only request is returned as the error.
pub async fn acquire_local_media(devices: &dyn MediaDevices, want_video: bool) -> Result<AcquiredMedia, MediaError> {
    if want_video {
        match devices.get_user_media(MediaConstraints::audio_video()).await {
            Ok(stream) => {
                let video = stream.has_video();
                return Ok(AcquiredMedia { stream, video });
            }
            Err(e) => {
                tracing::warn!("Camera unavailable ({}), falling back to audio only", e);
            }
        }
    }

    let stream = devices.get_user_media(MediaConstraints::audio_only()).await?;
    Ok(AcquiredMedia { stream, video: false })
}
