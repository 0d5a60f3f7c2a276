//! Speech sink port: serialized, one-utterance-at-a-time audio output.

use async_trait::async_trait;

/// Errors reported by a speech sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// This utterance failed; the sink can still speak the next one.
    #[error("utterance failed: {0}")]
    Utterance(String),

    /// The sink cannot speak at all (engine missing, audio device gone).
    #[error("speech engine unavailable: {0}")]
    Unavailable(String),
}

impl SpeechError {
    /// Whether the narration session must end because of this error.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Backend-agnostic speech output.
///
/// # Contract
///
/// The caller never issues a second `speak` before the previous future has
/// resolved or been dropped. Dropping the future abandons the utterance;
/// [`cancel`](SpeechSink::cancel) is then called so the engine can silence
/// any audio still queued.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    /// Speak `text` and resolve once the utterance has finished playing.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Silence any in-progress utterance.
    fn cancel(&self) {}
}
