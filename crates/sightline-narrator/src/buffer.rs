//! Append-only narration text with its speech cursor.
//!
//! [`NarrationBuffer`] holds the text generated in one session together with
//! `spoken_offset`, the number of bytes already handed to the speech sink.
//! Taking a span slices everything after the offset and advances the offset
//! to the length observed at that moment, in one step, so concurrent appends
//! land in the next span and are never counted twice.
//!
//! Invariants:
//! - `spoken_offset` never decreases and never exceeds `text.len()`;
//! - concatenating every span taken, in order, reproduces `text`;
//! - once sealed the buffer rejects appends.

use sightline_core::SpeechSpan;

/// Rejected append on a sealed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("narration buffer is sealed")]
pub struct BufferSealed;

/// Generated text plus the speech cursor for a single session.
#[derive(Debug, Default)]
pub struct NarrationBuffer {
    text: String,
    spoken_offset: usize,
    last_sequence_no: u64,
    sealed: bool,
}

impl NarrationBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an increment.
    pub fn append(&mut self, increment: &str) -> Result<(), BufferSealed> {
        if self.sealed {
            return Err(BufferSealed);
        }
        self.text.push_str(increment);
        Ok(())
    }

    /// Take the unspoken tail as the next span, if there is one.
    pub fn take_span(&mut self) -> Option<SpeechSpan> {
        if self.sealed || self.spoken_offset == self.text.len() {
            return None;
        }
        let end = self.text.len();
        let text = self.text[self.spoken_offset..end].to_owned();
        self.spoken_offset = end;
        self.last_sequence_no += 1;
        Some(SpeechSpan {
            text,
            sequence_no: self.last_sequence_no,
        })
    }

    /// Full text generated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bytes already dispatched for speech.
    pub const fn spoken_offset(&self) -> usize {
        self.spoken_offset
    }

    /// Bytes generated but not yet dispatched.
    pub fn pending_len(&self) -> usize {
        self.text.len() - self.spoken_offset
    }

    /// Sequence number of the most recent span (0 before the first).
    pub const fn last_sequence_no(&self) -> u64 {
        self.last_sequence_no
    }

    /// Whether the buffer has been sealed.
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Forbid any further mutation of text or cursor.
    pub const fn seal(&mut self) {
        self.sealed = true;
    }

    /// Seal and drop the text, keeping the buffer unusable.
    pub fn clear(&mut self) {
        self.seal();
        self.text = String::new();
        self.spoken_offset = 0;
    }
}
