//! Narration error taxonomy.
//!
//! Every failure the core can observe resolves into one of these variants at
//! the session controller boundary. None of them is allowed to escape as a
//! panic.

use crate::settings::SettingsError;

/// Errors surfaced by the narration core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NarrationError {
    /// The inference handle is degraded or the backend is not loaded.
    #[error("Model not ready: {0}")]
    HandleUnusable(String),

    /// Another flow currently holds the inference handle.
    #[error("Inference handle is busy")]
    HandleBusy,

    /// The generation stream died before completing.
    #[error("Description stream failed: {0}")]
    StreamFailure(String),

    /// The speech engine failed an utterance or cannot speak at all.
    #[error("Speech output failed: {0}")]
    SinkFailure(String),

    /// The speech recognizer reported an error (non-fatal).
    #[error("Speech recognition error {code}: {message}")]
    RecognizerFailure { code: i32, message: String },

    /// A narration session is already running.
    #[error("A narration session is already active")]
    AlreadyActive,

    /// No image source is wired up, so a session cannot capture a scene.
    #[error("Image capture is not available")]
    CaptureUnavailable,

    /// The image source failed to deliver a frame.
    #[error("Image capture failed: {0}")]
    CaptureFailed(String),

    /// The session controller task is no longer running.
    #[error("Session controller has shut down")]
    ControllerClosed,

    /// Settings failed validation.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl NarrationError {
    /// Whether this error is a synchronous rejection of a request that left
    /// all state untouched.
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive | Self::HandleBusy | Self::HandleUnusable(_)
        )
    }

    /// Short human-readable text for observer/UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::HandleUnusable(_) => "Model not ready".to_owned(),
            Self::HandleBusy | Self::AlreadyActive => "Already describing a scene".to_owned(),
            Self::StreamFailure(_) => "The description stopped unexpectedly".to_owned(),
            Self::SinkFailure(_) => "Speech output is unavailable".to_owned(),
            Self::RecognizerFailure { message, .. } => message.clone(),
            Self::CaptureUnavailable => "Camera is not available".to_owned(),
            Self::CaptureFailed(_) => "Could not capture an image".to_owned(),
            Self::ControllerClosed => "Narration has shut down".to_owned(),
            Self::Settings(e) => e.to_string(),
        }
    }
}
