//! Voice command routing.
//!
//! Maps recognized utterances onto controller actions: `start` and `stop`
//! (trimmed, case-insensitive) drive the session directly, and any other
//! phrase becomes a custom request that is embedded verbatim in the prompt
//! of a new session. Recognizer errors are reported to the observer and
//! never end a session.

use std::sync::Arc;

use sightline_core::{
    Command, CommandKind, NarrationError, NarrationEvent, NarrationObserver, NarrationSettings,
    SessionId,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::SessionController;

/// Input from a continuous speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A final recognition result.
    Command(String),
    /// A recognizer error code.
    Error(i32),
}

/// What a routed command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Blank input.
    Ignored,
    /// A session was started.
    Started(SessionId),
    /// `stop` was handled; `false` if nothing was active.
    Stopped(bool),
    /// The controller rejected the request.
    Rejected(NarrationError),
}

/// Human-readable text for a recognizer error code.
pub const fn recognizer_error_message(code: i32) -> &'static str {
    match code {
        1 => "Network timeout",
        2 => "Network error",
        3 => "Audio recording error",
        4 => "Server error",
        5 => "Client side error",
        6 => "No speech input",
        7 => "No match found",
        8 => "Recognition service busy",
        9 => "Insufficient permissions",
        _ => "Unknown speech recognition error",
    }
}

/// Routes recognized speech to the [`SessionController`].
pub struct VoiceCommandRouter {
    controller: SessionController,
    settings: NarrationSettings,
    observer: Arc<dyn NarrationObserver>,
    pending_prompt: Option<String>,
}

impl VoiceCommandRouter {
    /// Route commands to `controller`, reporting through `observer`.
    pub fn new(
        controller: SessionController,
        settings: NarrationSettings,
        observer: Arc<dyn NarrationObserver>,
    ) -> Self {
        Self {
            controller,
            settings,
            observer,
            pending_prompt: None,
        }
    }

    /// Custom prompt waiting to be consumed by the next start, if any.
    pub fn pending_prompt(&self) -> Option<&str> {
        self.pending_prompt.as_deref()
    }

    /// Route one recognized phrase.
    pub async fn on_command(&mut self, text: &str) -> RouteOutcome {
        let Some(kind) = Command::new(text).classify() else {
            debug!("Ignoring blank voice command");
            return RouteOutcome::Ignored;
        };

        match kind {
            CommandKind::Start => {
                info!("Voice command: start");
                let prompt = self.settings.effective_default_prompt().to_owned();
                self.start(prompt).await
            }
            CommandKind::Stop => {
                info!("Voice command: stop");
                match self.controller.stop().await {
                    Ok(stopped) => RouteOutcome::Stopped(stopped),
                    Err(e) => RouteOutcome::Rejected(e),
                }
            }
            CommandKind::Custom(request) => {
                info!(request = %request, "Voice command: custom request");
                self.pending_prompt = Some(self.settings.custom_prompt(&request));
                self.start_pending().await
            }
        }
    }

    /// Report a recognizer error. Listening continues.
    pub fn on_error(&self, code: i32) -> NarrationError {
        let message = recognizer_error_message(code).to_owned();
        warn!(code, message = %message, "Speech recognizer error");
        self.observer.emit(NarrationEvent::RecognizerError {
            code,
            message: message.clone(),
        });
        NarrationError::RecognizerFailure { code, message }
    }

    /// Consume recognizer events until the source closes or `cancel` fires.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RecognizerEvent>,
        cancel: CancellationToken,
    ) {
        debug!("Voice command router listening");
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Some(RecognizerEvent::Command(text)) => {
                    if let RouteOutcome::Rejected(NarrationError::ControllerClosed) =
                        self.on_command(&text).await
                    {
                        warn!("Session controller closed; router exiting");
                        break;
                    }
                }
                Some(RecognizerEvent::Error(code)) => {
                    self.on_error(code);
                }
                None => break,
            }
        }
        debug!("Voice command router stopped");
    }

    async fn start_pending(&mut self) -> RouteOutcome {
        match self.pending_prompt.take() {
            Some(prompt) => self.start(prompt).await,
            None => RouteOutcome::Ignored,
        }
    }

    async fn start(&self, prompt: String) -> RouteOutcome {
        match self.controller.start(prompt).await {
            Ok(id) => RouteOutcome::Started(id),
            Err(e) => RouteOutcome::Rejected(e),
        }
    }
}

impl std::fmt::Debug for VoiceCommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceCommandRouter")
            .field("pending_prompt", &self.pending_prompt)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_recognizer_codes_have_messages() {
        assert_eq!(recognizer_error_message(7), "No match found");
        assert_eq!(recognizer_error_message(9), "Insufficient permissions");
        assert_eq!(
            recognizer_error_message(42),
            "Unknown speech recognition error"
        );
    }
}
