//! Narration events surfaced to observers (UI, CLI, logs).
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "utterance_started", "sessionId": 3, "sequenceNo": 1, "text": "A kitchen" }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{SessionId, SessionPhase};

/// Observer-facing view of the narration state.
///
/// Purely read-only with respect to the core; a fresh snapshot is published
/// whenever any of its fields changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationSnapshot {
    /// Active (or just-terminated) session, if any.
    pub session_id: Option<SessionId>,
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Full text generated so far in the active session.
    pub generated_text: String,
    /// Whether the generation stream is still producing text.
    pub is_generating: bool,
    /// Whether an utterance is currently in flight.
    pub is_speaking: bool,
    /// Human-readable error from the last session, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Generation and speech both completed.
    Completed,
    /// `stop()` was requested.
    Stopped,
    /// An unrecoverable error ended the session.
    Failed {
        /// Human-readable error text.
        message: String,
    },
}

/// Events emitted by the narration core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NarrationEvent {
    /// The observer-facing snapshot changed.
    Snapshot(NarrationSnapshot),

    /// A start request was accepted.
    SessionStarted {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        prompt: String,
    },

    /// A span was handed to the speech sink.
    UtteranceStarted {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "sequenceNo")]
        sequence_no: u64,
        text: String,
    },

    /// The speech sink acknowledged an utterance.
    UtteranceFinished {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "sequenceNo")]
        sequence_no: u64,
    },

    /// The speech sink failed a single utterance; narration continues.
    SpeechWarning {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "sequenceNo")]
        sequence_no: u64,
        message: String,
    },

    /// The session ended.
    SessionEnded {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        reason: TerminationReason,
    },

    /// A start request was rejected without any state change.
    StartRejected { message: String },

    /// The speech recognizer reported an error; listening continues.
    RecognizerError { code: i32, message: String },
}

impl NarrationEvent {
    /// Session this event belongs to, if any.
    pub const fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Snapshot(snapshot) => snapshot.session_id,
            Self::SessionStarted { session_id, .. }
            | Self::UtteranceStarted { session_id, .. }
            | Self::UtteranceFinished { session_id, .. }
            | Self::SpeechWarning { session_id, .. }
            | Self::SessionEnded { session_id, .. } => Some(*session_id),
            Self::StartRejected { .. } | Self::RecognizerError { .. } => None,
        }
    }
}
