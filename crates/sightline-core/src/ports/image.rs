//! Image source port: camera or file frame acquisition.

use async_trait::async_trait;

use crate::domain::Image;

/// Errors reported by an image source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The camera (or file) could not be opened.
    #[error("image source unavailable: {0}")]
    Unavailable(String),

    /// A frame could not be produced.
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Source of the frame narrated by a session.
///
/// Invoked once per session while it is in the `Capturing` phase.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Capture one frame.
    async fn capture(&self) -> Result<Image, CaptureError>;
}
