//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the narration core expects from the outside
//! world. They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - The inference engine, speech engine and camera are opaque behind these
//!   traits; the core never touches platform APIs.
//! - All traits are `Send + Sync` so adapters can be shared as `Arc<dyn _>`
//!   between the controller task and the tasks it spawns.

pub mod image;
pub mod inference;
pub mod observer;
pub mod speech;

pub use image::{CaptureError, ImageSource};
pub use inference::{
    GenerationChunk, GenerationOutcome, GenerationSender, GenerationStream, InferenceError,
    InferenceProvider,
};
pub use observer::{ChannelObserver, NarrationObserver, NoopObserver};
pub use speech::{SpeechError, SpeechSink};
