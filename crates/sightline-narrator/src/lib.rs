//! Streaming generation-to-speech narration.
//!
//! A session captures a frame, streams a description of it from the
//! inference backend and speaks the text while it is still being generated.
//! The pieces:
//!
//! - [`guard`]: exclusive, health-tracked access to the inference handle.
//! - [`buffer`]: generated text and the once-only speech cursor.
//! - [`dispatcher`]: when to speak, wait or finish.
//! - [`controller`]: the session state machine, run as a tokio actor.
//! - [`router`]: voice commands in, controller actions out.
#![deny(unused_crate_dependencies)]

pub mod buffer;
pub mod controller;
pub mod dispatcher;
pub mod guard;
pub mod router;

pub use buffer::{BufferSealed, NarrationBuffer};
pub use controller::{ControllerDeps, HANDLE_RELEASE_TIMEOUT, SessionController};
pub use dispatcher::{DispatchAction, SpeechDispatcher, UnexpectedCompletion};
pub use guard::{AcquireError, HandleHealth, InferenceGuard, InferenceLease};
pub use router::{RecognizerEvent, RouteOutcome, VoiceCommandRouter, recognizer_error_message};
