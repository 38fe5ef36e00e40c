use chrono::{DateTime, Utc};

use super::call_screen::format_duration;
use crate::models::{CallHistoryRecord, CallStatus, CallType};
use crate::state::CallDirection;

/// One row of the call history list, from the signed-in user's side
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub other_user_id: i64,
    pub direction: CallDirection,
    pub call_type: CallType,
    pub status: CallStatus,
    pub duration_text: String,
    pub started_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_record(record: &CallHistoryRecord, self_id: i64) -> Self {
        let (direction, other_user_id) = if record.caller_id == self_id {
            (CallDirection::Outgoing, record.receiver_id)
        } else {
            (CallDirection::Incoming, record.caller_id)
        };

        Self {
            id: record.id,
            other_user_id,
            direction,
            call_type: record.call_type,
            status: record.status,
            duration_text: format_duration(record.duration_seconds as i64),
            started_at: record.started_at,
        }
    }

    /// A call the signed-in user received and never picked up
    pub fn is_missed_by_me(&self) -> bool {
        self.direction == CallDirection::Incoming && self.status == CallStatus::Missed
    }

    pub fn summary(&self) -> String {
        let direction = match self.direction {
            CallDirection::Outgoing => "to",
            CallDirection::Incoming => "from",
        };
        format!(
            "{} {} call {} user {} - {} ({})",
            self.started_at.format("%Y-%m-%d %H:%M"),
            self.call_type.as_str(),
            direction,
            self.other_user_id,
            self.status.display_name(),
            self.duration_text
        )
    }
}
