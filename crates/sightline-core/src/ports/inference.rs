//! Inference provider port and the generation stream contract.
//!
//! A provider turns a prompt plus images into a [`GenerationStream`]: an
//! ordered, finite, non-restartable sequence of non-empty text increments
//! terminated by exactly one completion signal.
//!
//! The producer side holds a [`GenerationSender`]. Completion is delivered by
//! consuming the sender (`finish` / `fail`), so a second completion cannot be
//! expressed. A sender that is dropped without completing still terminates
//! the stream: the consumer observes a synthesized failure instead of
//! waiting forever.
//!
//! The sender also marks how long the run is alive. A provider keeps it
//! until its backend work has stopped, and [`GenerationStream::close`]
//! resolves only once every producer has let go of it. Whoever holds the
//! inference handle waits on `close` before giving the handle back.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::domain::Image;

/// Errors reported by an inference provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    /// No model is loaded.
    #[error("model is not loaded")]
    NotLoaded,

    /// The backend rejected or failed an operation.
    #[error("inference backend error: {0}")]
    Backend(String),
}

/// Backend-agnostic streaming inference engine.
///
/// Implementations are not expected to be safe under concurrent use; the
/// narration core serializes every call through an exclusive lease.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Whether a usable backend instance currently exists.
    fn is_ready(&self) -> bool;

    /// Clear accumulated conversational state before a fresh run.
    async fn reset(&self) -> Result<(), InferenceError>;

    /// Start generating a description for `prompt` over `images`.
    ///
    /// Returns as soon as the run has started. The returned stream's
    /// [`GenerationSender`] must stay alive while the run uses the backend.
    async fn open_stream(
        &self,
        prompt: &str,
        images: Vec<Image>,
    ) -> Result<GenerationStream, InferenceError>;
}

// ── Stream items ───────────────────────────────────────────────────

/// How a generation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The producer finished normally.
    Finished,
    /// The producer died; the text received so far stays valid.
    Failed(String),
}

/// One item delivered by a [`GenerationStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationChunk {
    /// A non-empty piece of generated text.
    Increment(String),
    /// The terminal completion signal.
    Done(GenerationOutcome),
}

const DROPPED_PRODUCER: &str = "producer stopped without completing";

// ── Producer side ──────────────────────────────────────────────────

/// Producer half of a generation stream.
#[derive(Debug)]
pub struct GenerationSender {
    tx: mpsc::Sender<GenerationChunk>,
    /// Never sent on; dropping it wakes [`GenerationStream::close`].
    _running: oneshot::Sender<()>,
}

impl GenerationSender {
    /// Deliver one increment.
    ///
    /// Empty text is skipped. Returns `false` once the consumer has gone
    /// away, which producers should treat as a request to stop.
    pub async fn increment(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(GenerationChunk::Increment(text)).await.is_ok()
    }

    /// Whether the consumer has dropped the stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Complete the stream successfully.
    pub async fn finish(self) {
        let _ = self
            .tx
            .send(GenerationChunk::Done(GenerationOutcome::Finished))
            .await;
    }

    /// Complete the stream with an error marker.
    pub async fn fail(self, reason: impl Into<String>) {
        let _ = self
            .tx
            .send(GenerationChunk::Done(GenerationOutcome::Failed(reason.into())))
            .await;
    }
}

// ── Consumer side ──────────────────────────────────────────────────

/// Consumer half of a generation stream.
#[derive(Debug)]
pub struct GenerationStream {
    rx: mpsc::Receiver<GenerationChunk>,
    completed: bool,
    running: Option<oneshot::Receiver<()>>,
}

impl GenerationStream {
    /// Create a connected sender/stream pair with a bounded buffer.
    pub fn channel(capacity: usize) -> (GenerationSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (running_tx, running_rx) = oneshot::channel();
        (
            GenerationSender {
                tx,
                _running: running_tx,
            },
            Self {
                rx,
                completed: false,
                running: Some(running_rx),
            },
        )
    }

    /// Wait for the next chunk.
    ///
    /// Yields increments in emission order, then exactly one
    /// [`GenerationChunk::Done`], then `None` forever. Cancel-safe.
    pub async fn next(&mut self) -> Option<GenerationChunk> {
        if self.completed {
            return None;
        }
        let chunk = loop {
            match self.rx.recv().await {
                Some(GenerationChunk::Increment(text)) if text.is_empty() => {}
                Some(chunk) => break chunk,
                None => {
                    break GenerationChunk::Done(GenerationOutcome::Failed(
                        DROPPED_PRODUCER.to_owned(),
                    ));
                }
            }
        };
        if matches!(chunk, GenerationChunk::Done(_)) {
            self.completed = true;
            self.rx.close();
        }
        Some(chunk)
    }

    /// Stop consuming and wait until the producer has dropped its sender.
    ///
    /// A producer blocked on a full buffer is woken with a closed channel.
    /// Streams from [`from_increments`](Self::from_increments) have no
    /// producer and close immediately.
    pub async fn close(mut self) {
        self.rx.close();
        if let Some(running) = self.running.take() {
            let _ = running.await;
        }
    }

    /// Build a stream that replays fixed increments and then finishes.
    ///
    /// Useful for adapters whose backend returns the whole text at once.
    pub fn from_increments<I, S>(increments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = increments
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        let (tx, rx) = mpsc::channel(items.len() + 1);
        for text in items {
            let _ = tx.try_send(GenerationChunk::Increment(text));
        }
        let _ = tx.try_send(GenerationChunk::Done(GenerationOutcome::Finished));
        Self {
            rx,
            completed: false,
            running: None,
        }
    }
}
