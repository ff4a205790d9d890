//! EventKind - canonical kind of an inbound provider notification
//!
//! Providers have used many names for the same lifecycle stage across API
//! versions. All of them collapse into the handful of kinds below.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Ringing,
    Active,
    TranscriptChunk,
    Completed,
    Failed,
    /// A kind this service does not know; acknowledged and ignored
    Unrecognized(String),
}

impl EventKind {
    /// Map a free-text provider event type or status string to a kind
    ///
    /// Matching is case-insensitive and treats `-`, `.`, and spaces like `_`.
    /// Returns `None` for empty input.
    pub fn from_provider(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                '-' | '.' | ' ' | '/' => '_',
                other => other,
            })
            .collect();

        if key.is_empty() {
            return None;
        }

        let kind = match key.as_str() {
            "ringing" | "initiated" | "call_initiated" | "call_ringing" | "dialing"
            | "call_queued_at_provider" => EventKind::Ringing,

            "in_progress" | "inprogress" | "connected" | "answered" | "call_answered"
            | "call_connected" | "call_started" | "started" | "active" | "ongoing"
            | "call_in_progress" => EventKind::Active,

            "transcript" | "transcription" | "transcript_chunk" | "transcript_partial"
            | "partial_transcript" | "transcript_update" | "conversation_update"
            | "live_transcript" => EventKind::TranscriptChunk,

            "completed" | "complete" | "call_completed" | "ended" | "call_ended" | "end"
            | "finished" | "hangup" | "hung_up" | "call_analyzed" | "post_call_analysis"
            | "workflow_completed" | "end_of_call_report" => EventKind::Completed,

            "failed" | "failure" | "error" | "call_failed" | "busy" | "no_answer"
            | "noanswer" | "unreachable" | "rejected" | "declined" | "canceled"
            | "cancelled" | "call_canceled" | "call_cancelled" | "voicemail" => EventKind::Failed,

            _ => EventKind::Unrecognized(raw.trim().to_string()),
        };

        Some(kind)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, EventKind::Unrecognized(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Completed | EventKind::Failed)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ringing => write!(f, "ringing"),
            Self::Active => write!(f, "active"),
            Self::TranscriptChunk => write!(f, "transcript_chunk"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Unrecognized(raw) => write!(f, "unrecognized:{}", raw),
        }
    }
}
