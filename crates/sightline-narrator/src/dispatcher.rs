//! Speech dispatch decisions.
//!
//! [`SpeechDispatcher`] decides, given the current buffer and whether
//! generation has finished, what the session should do next with the speech
//! sink. It performs no I/O: the controller executes the returned
//! [`DispatchAction`] and reports timer and utterance completions back.
//!
//! ```text
//!            delay elapsed ─┐
//!                           ├─► triggered ──► loop:
//!   generation completed ───┘                 span non-empty      → Speak
//!                                             empty, still going  → Wait (poll)
//!                                             empty, done         → Finished
//! ```
//!
//! A delay that elapses while nothing has been generated simply lands in the
//! `Wait` branch; it is not restarted. At most one utterance is in flight:
//! while one is outstanding every evaluation returns [`DispatchAction::Busy`].

use sightline_core::SpeechSpan;

use crate::buffer::NarrationBuffer;

/// What the controller should do next for speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    /// Speech has not been triggered yet.
    Hold,
    /// An utterance is still in flight.
    Busy,
    /// Hand this span to the speech sink.
    Speak(SpeechSpan),
    /// Nothing new to say yet; look again after the poll interval.
    Wait,
    /// Generation is done and every character has been dispatched.
    Finished,
}

/// A completion arrived for an utterance that is not the one in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("completion for utterance {received} while {expected:?} is in flight")]
pub struct UnexpectedCompletion {
    /// Sequence number currently in flight, if any.
    pub expected: Option<u64>,
    /// Sequence number the sink reported.
    pub received: u64,
}

/// Per-session speech loop state.
#[derive(Debug, Default)]
pub struct SpeechDispatcher {
    triggered: bool,
    in_flight: Option<u64>,
    poll_armed: bool,
    finished: bool,
}

impl SpeechDispatcher {
    /// Create a dispatcher waiting for its first trigger.
    pub fn new() -> Self {
        Self::default()
    }

    /// The first-speech delay has elapsed.
    pub const fn on_delay_elapsed(&mut self) {
        self.triggered = true;
    }

    /// Decide the next step against the current buffer.
    ///
    /// Taking a span advances the buffer's cursor in the same call, so a
    /// span is never computed from stale state.
    pub fn next_action(
        &mut self,
        buffer: &mut NarrationBuffer,
        generation_done: bool,
    ) -> DispatchAction {
        if self.finished {
            return DispatchAction::Finished;
        }
        if generation_done {
            self.triggered = true;
        }
        if !self.triggered {
            return DispatchAction::Hold;
        }
        if self.in_flight.is_some() {
            return DispatchAction::Busy;
        }
        match buffer.take_span() {
            Some(span) => {
                self.in_flight = Some(span.sequence_no);
                DispatchAction::Speak(span)
            }
            None if generation_done => {
                self.finished = true;
                DispatchAction::Finished
            }
            None => DispatchAction::Wait,
        }
    }

    /// The sink finished (or failed) the utterance `sequence_no`.
    ///
    /// Failures count as finished; the span is never retried.
    pub fn on_utterance_finished(&mut self, sequence_no: u64) -> Result<(), UnexpectedCompletion> {
        match self.in_flight {
            Some(current) if current == sequence_no => {
                self.in_flight = None;
                Ok(())
            }
            expected => Err(UnexpectedCompletion {
                expected,
                received: sequence_no,
            }),
        }
    }

    /// Claim the poll timer. Returns `false` if one is already pending.
    pub const fn arm_poll(&mut self) -> bool {
        if self.poll_armed {
            false
        } else {
            self.poll_armed = true;
            true
        }
    }

    /// The poll timer fired.
    pub const fn on_poll_elapsed(&mut self) {
        self.poll_armed = false;
    }

    /// Whether speech has been triggered.
    pub const fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Whether an utterance is in flight.
    pub const fn is_speaking(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether every character has been dispatched and generation is done.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(text: &str) -> NarrationBuffer {
        let mut buffer = NarrationBuffer::new();
        buffer.append(text).unwrap();
        buffer
    }

    #[test]
    fn holds_until_triggered() {
        let mut dispatcher = SpeechDispatcher::new();
        let mut buffer = buffer_with("A");
        assert_eq!(dispatcher.next_action(&mut buffer, false), DispatchAction::Hold);
        assert_eq!(buffer.spoken_offset(), 0);
    }

    #[test]
    fn completion_triggers_immediately() {
        let mut dispatcher = SpeechDispatcher::new();
        let mut buffer = buffer_with("ABC");

        let action = dispatcher.next_action(&mut buffer, true);
        assert_eq!(
            action,
            DispatchAction::Speak(SpeechSpan {
                text: "ABC".into(),
                sequence_no: 1
            })
        );
        assert!(dispatcher.is_speaking());
    }

    #[test]
    fn delay_on_empty_buffer_waits() {
        let mut dispatcher = SpeechDispatcher::new();
        let mut buffer = NarrationBuffer::new();
        dispatcher.on_delay_elapsed();

        assert_eq!(dispatcher.next_action(&mut buffer, false), DispatchAction::Wait);

        buffer.append("late").unwrap();
        assert!(matches!(
            dispatcher.next_action(&mut buffer, false),
            DispatchAction::Speak(span) if span.text == "late"
        ));
    }

    #[test]
    fn one_utterance_in_flight() {
        let mut dispatcher = SpeechDispatcher::new();
        let mut buffer = buffer_with("first");
        dispatcher.on_delay_elapsed();

        assert!(matches!(
            dispatcher.next_action(&mut buffer, false),
            DispatchAction::Speak(_)
        ));
        buffer.append(" second").unwrap();
        assert_eq!(dispatcher.next_action(&mut buffer, false), DispatchAction::Busy);

        dispatcher.on_utterance_finished(1).unwrap();
        assert_eq!(
            dispatcher.next_action(&mut buffer, false),
            DispatchAction::Speak(SpeechSpan {
                text: " second".into(),
                sequence_no: 2
            })
        );
    }

    #[test]
    fn finishes_only_when_done_and_drained() {
        let mut dispatcher = SpeechDispatcher::new();
        let mut buffer = buffer_with("tail");
        dispatcher.on_delay_elapsed();

        assert!(matches!(
            dispatcher.next_action(&mut buffer, false),
            DispatchAction::Speak(_)
        ));
        dispatcher.on_utterance_finished(1).unwrap();
        assert_eq!(dispatcher.next_action(&mut buffer, false), DispatchAction::Wait);
        assert_eq!(
            dispatcher.next_action(&mut buffer, true),
            DispatchAction::Finished
        );
        assert!(dispatcher.is_finished());
        assert_eq!(
            dispatcher.next_action(&mut buffer, true),
            DispatchAction::Finished
        );
    }

    #[test]
    fn mismatched_completion_is_reported() {
        let mut dispatcher = SpeechDispatcher::new();
        let mut buffer = buffer_with("x");
        dispatcher.on_delay_elapsed();
        let _ = dispatcher.next_action(&mut buffer, false);

        let err = dispatcher.on_utterance_finished(7).unwrap_err();
        assert_eq!(
            err,
            UnexpectedCompletion {
                expected: Some(1),
                received: 7
            }
        );
        assert!(dispatcher.is_speaking());
    }

    #[test]
    fn poll_is_armed_once() {
        let mut dispatcher = SpeechDispatcher::new();
        assert!(dispatcher.arm_poll());
        assert!(!dispatcher.arm_poll());
        dispatcher.on_poll_elapsed();
        assert!(dispatcher.arm_poll());
    }
}
