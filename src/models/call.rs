use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// One persisted call attempt, as stored by the call log service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallHistoryRecord {
    pub id: i64,
    #[serde(rename = "callerId")]
    pub caller_id: i64,
    #[serde(rename = "receiverId")]
    pub receiver_id: i64,
    #[serde(rename = "callType")]
    pub call_type: CallType,
    pub status: CallStatus,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: i32,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "endedAt")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn from_video(is_video: bool) -> Self {
        if is_video { CallType::Video } else { CallType::Audio }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Audio => "audio",
            CallType::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(CallType::Audio),
            "video" => Some(CallType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Initiated,
    Completed,
    Missed,
    Declined,
}

impl CallStatus {
    pub fn display_name(&self) -> &str {
        match self {
            CallStatus::Initiated => "Calling...",
            CallStatus::Completed => "Completed",
            CallStatus::Missed => "Missed",
            CallStatus::Declined => "Declined",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Initiated => "initiated",
            CallStatus::Completed => "completed",
            CallStatus::Missed => "missed",
            CallStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiated" => Some(CallStatus::Initiated),
            "completed" => Some(CallStatus::Completed),
            "missed" => Some(CallStatus::Missed),
            "declined" => Some(CallStatus::Declined),
            _ => None,
        }
    }

    /// Whether this status closes the call attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Initiated)
    }
}

/// Body of `POST /api/calls/log`. The caller is the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogCallRequest {
    #[serde(rename = "receiverId")]
    pub receiver_id: i64,
    #[serde(rename = "callType")]
    pub call_type: CallType,
    #[serde(default = "initiated")]
    pub status: CallStatus,
}

fn initiated() -> CallStatus {
    CallStatus::Initiated
}

/// Body of `PATCH /api/calls/{id}` and `PATCH /api/calls/by-users/{caller}/{receiver}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateCallRequest {
    pub status: CallStatus,
    /// Duration in whole seconds
    #[serde(default)]
    pub duration: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResponse {
    pub call: CallHistoryRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHistoryResponse {
    pub calls: Vec<CallHistoryRecord>,
}
