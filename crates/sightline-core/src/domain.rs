//! Session and command domain types.
//!
//! These are plain value types shared by the narration core and its
//! adapters. They carry no behaviour beyond classification and display.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Session identity ───────────────────────────────────────────────

/// Opaque identifier of one narration attempt.
///
/// Allocated by the session controller; never reused within a process. Any
/// callback tagged with an id that is no longer the active session is
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ── Session lifecycle ──────────────────────────────────────────────

/// Lifecycle phase of the narration session as seen by observers.
///
/// `Speaking` overlaps generation in practice: utterances may start while
/// the phase is still `Generating`. The phase reads `Speaking` only once
/// generation has completed and the remaining text is being narrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session is active.
    #[default]
    Idle,

    /// Waiting for the image source to deliver a frame.
    Capturing,

    /// The generation stream is open and producing text.
    Generating,

    /// Generation finished; remaining text is being spoken.
    Speaking,

    /// The session has ended (naturally, by stop, or by error).
    Terminated,
}

impl SessionPhase {
    /// Short lowercase label for logs and wire payloads.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Generating => "generating",
            Self::Speaking => "speaking",
            Self::Terminated => "terminated",
        }
    }

    /// Whether a session occupying this phase blocks a new `start`.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Capturing | Self::Generating | Self::Speaking)
    }
}

// ── Speech spans ───────────────────────────────────────────────────

/// A contiguous, once-only slice of generated text dispatched as one
/// utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSpan {
    /// The text to speak.
    pub text: String,
    /// Strictly increasing per session, starting at 1.
    pub sequence_no: u64,
}

// ── Images ─────────────────────────────────────────────────────────

/// A captured frame handed to the inference provider.
///
/// The core never inspects the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// MIME type of `data` (e.g. `"image/jpeg"`).
    pub mime_type: String,
}

impl Image {
    /// Create an image from encoded bytes.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

// ── Voice commands ─────────────────────────────────────────────────

/// A single recognized utterance from the speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// The recognizer's text, unmodified.
    pub raw_text: String,
}

/// Classification of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// The reserved word `start`.
    Start,
    /// The reserved word `stop`.
    Stop,
    /// Any other non-empty text, used as a custom description request.
    Custom(String),
}

impl Command {
    /// Wrap recognizer output.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
        }
    }

    /// Classify the command.
    ///
    /// The reserved words are matched case-insensitively after trimming.
    /// Everything else that is not blank is a custom request (open
    /// vocabulary). Blank text yields `None`.
    pub fn classify(&self) -> Option<CommandKind> {
        let text = self.raw_text.trim();
        if text.is_empty() {
            return None;
        }
        if text.eq_ignore_ascii_case("start") {
            Some(CommandKind::Start)
        } else if text.eq_ignore_ascii_case("stop") {
            Some(CommandKind::Stop)
        } else {
            Some(CommandKind::Custom(text.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_are_case_insensitive() {
        assert_eq!(Command::new("start").classify(), Some(CommandKind::Start));
        assert_eq!(Command::new("START").classify(), Some(CommandKind::Start));
        assert_eq!(Command::new("  Stop ").classify(), Some(CommandKind::Stop));
    }

    #[test]
    fn other_text_is_custom_prompt() {
        assert_eq!(
            Command::new("help me find my keys").classify(),
            Some(CommandKind::Custom("help me find my keys".to_owned()))
        );
        // Reserved words only match as the whole utterance.
        assert_eq!(
            Command::new("start reading").classify(),
            Some(CommandKind::Custom("start reading".to_owned()))
        );
    }

    #[test]
    fn blank_text_is_ignored() {
        assert_eq!(Command::new("").classify(), None);
        assert_eq!(Command::new("   \n").classify(), None);
    }

    #[test]
    fn phase_activity() {
        assert!(!SessionPhase::Idle.is_active());
        assert!(SessionPhase::Capturing.is_active());
        assert!(SessionPhase::Generating.is_active());
        assert!(SessionPhase::Speaking.is_active());
        assert!(!SessionPhase::Terminated.is_active());
    }

    #[test]
    fn session_id_display() {
        assert_eq!(SessionId::new(7).to_string(), "session-7");
    }

    #[test]
    fn image_debug_hides_bytes() {
        let image = Image::new(vec![1, 2, 3], "image/png");
        assert_eq!(
            format!("{image:?}"),
            "Image { bytes: 3, mime_type: \"image/png\" }"
        );
    }
}
