//! Core domain types and port definitions for sightline.
//!
//! This crate holds everything the narration core and its adapters share:
//! session and command types, the collaborator ports (inference provider,
//! speech sink, image source, observer), the event union surfaced to UIs,
//! the error taxonomy and the settings model. It contains no runtime wiring.
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{Command, CommandKind, Image, SessionId, SessionPhase, SpeechSpan};
pub use error::NarrationError;
pub use events::{NarrationEvent, NarrationSnapshot, TerminationReason};
pub use ports::{
    CaptureError, ChannelObserver, GenerationChunk, GenerationOutcome, GenerationSender,
    GenerationStream, ImageSource, InferenceError, InferenceProvider, NarrationObserver,
    NoopObserver, SpeechError, SpeechSink,
};
pub use settings::{
    DEFAULT_FIRST_SPEECH_DELAY_MS, DEFAULT_POLL_INTERVAL_MS, NarrationSettings, SettingsError,
    SettingsUpdate, validate_settings,
};

#[cfg(test)]
use serde_json as _;
