//! Observer trait for surfacing narration events.
//!
//! Implementations handle transport details (channels, UI bindings, logs).
//! Observers are read-only with respect to the core.

use tokio::sync::mpsc;

use crate::events::NarrationEvent;

/// Trait for receiving narration events.
///
/// # Implementations
///
/// - [`NoopObserver`] - For tests and contexts that don't need events
/// - [`ChannelObserver`] - Forwards into an unbounded channel
pub trait NarrationObserver: Send + Sync {
    /// Receive an event.
    ///
    /// Called from the session controller task. This method must not block.
    fn emit(&self, event: NarrationEvent);
}

/// An observer that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl NoopObserver {
    /// Create a new no-op observer.
    pub const fn new() -> Self {
        Self
    }
}

impl NarrationObserver for NoopObserver {
    fn emit(&self, _event: NarrationEvent) {}
}

/// An observer that forwards every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<NarrationEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver it feeds.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NarrationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NarrationObserver for ChannelObserver {
    fn emit(&self, event: NarrationEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Narration event receiver dropped");
        }
    }
}
