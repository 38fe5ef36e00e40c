use chrono::{DateTime, Utc};

use crate::models::CallStatus;
use crate::state::{CallPhaseKind, CallView};

/// Actions the modal offers for the current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    Answer,
    Decline,
    Hangup,
    ToggleVideo,
    ToggleAudio,
}

/// What the call modal shows
#[derive(Debug, Clone, PartialEq)]
pub enum CallScreen {
    Hidden,
    Incoming {
        caller_name: String,
        is_video: bool,
    },
    Outgoing {
        callee_name: String,
        is_video: bool,
    },
    Active {
        remote_name: String,
        duration_text: String,
        video_enabled: bool,
        audio_enabled: bool,
        has_remote_stream: bool,
    },
    Ended {
        remote_name: String,
        status_text: String,
    },
}

impl CallScreen {
    pub fn from_view(view: &CallView, now: DateTime<Utc>) -> Self {
        let remote_name = view.remote_name.clone().unwrap_or_else(|| "Unknown".to_string());

        match view.phase {
            CallPhaseKind::Idle => CallScreen::Hidden,
            CallPhaseKind::Ringing => CallScreen::Incoming {
                caller_name: remote_name,
                is_video: view.video_enabled,
            },
            CallPhaseKind::Dialing => CallScreen::Outgoing {
                callee_name: remote_name,
                is_video: view.video_enabled,
            },
            CallPhaseKind::Active => {
                let elapsed = view
                    .started_at
                    .map(|start| (now - start).num_seconds().max(0))
                    .unwrap_or(0);
                CallScreen::Active {
                    remote_name,
                    duration_text: format_duration(elapsed),
                    video_enabled: view.video_enabled,
                    audio_enabled: view.audio_enabled,
                    has_remote_stream: view.has_remote_stream,
                }
            }
            CallPhaseKind::Ended => CallScreen::Ended {
                remote_name,
                status_text: ended_text(view.last_status, view.last_duration_secs.unwrap_or(0)),
            },
        }
    }

    pub fn actions(&self) -> Vec<CallAction> {
        match self {
            CallScreen::Incoming { .. } => vec![CallAction::Answer, CallAction::Decline],
            CallScreen::Outgoing { .. } => vec![CallAction::Hangup],
            CallScreen::Active { .. } => vec![CallAction::ToggleAudio, CallAction::ToggleVideo, CallAction::Hangup],
            CallScreen::Hidden | CallScreen::Ended { .. } => Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, CallScreen::Hidden)
    }

    /// Header line of the modal
    pub fn title(&self) -> String {
        match self {
            CallScreen::Hidden => String::new(),
            CallScreen::Incoming { caller_name, is_video } => {
                format!("Incoming {} call from {}", kind_label(*is_video), caller_name)
            }
            CallScreen::Outgoing { callee_name, .. } => format!("Calling {}...", callee_name),
            CallScreen::Active { remote_name, duration_text, .. } => format!("{} - {}", remote_name, duration_text),
            CallScreen::Ended { remote_name, status_text } => format!("{}: {}", remote_name, status_text),
        }
    }
}

fn kind_label(is_video: bool) -> &'static str {
    if is_video { "video" } else { "audio" }
}

fn ended_text(status: Option<CallStatus>, duration_secs: i32) -> String {
    match status {
        Some(CallStatus::Completed) => format!("Call ended ({})", format_duration(duration_secs as i64)),
        Some(status) => status.display_name().to_string(),
        None => "Call ended".to_string(),
    }
}

/// mm:ss, growing to h:mm:ss past an hour
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds >= 3600 {
        format!("{}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
    } else {
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }
}
