//! Event rendering for the terminal.
//!
//! Format-only: no narration logic lives here.

use sightline_core::{NarrationEvent, TerminationReason};

/// Render an event as one output line, or `None` if it is not shown.
///
/// In JSON mode every event is printed; in text mode snapshots are skipped
/// since utterance events already carry the text.
pub fn render_event(event: &NarrationEvent, json: bool) -> Option<String> {
    if json {
        return serde_json::to_string(event).ok();
    }
    match event {
        NarrationEvent::Snapshot(_) | NarrationEvent::UtteranceFinished { .. } => None,
        NarrationEvent::SessionStarted { session_id, prompt } => {
            Some(format!("▶ {session_id}: {}", truncate(prompt, 60)))
        }
        NarrationEvent::UtteranceStarted {
            sequence_no, text, ..
        } => Some(format!("🔊 [{sequence_no}] {}", text.trim())),
        NarrationEvent::SpeechWarning {
            sequence_no,
            message,
            ..
        } => Some(format!("⚠ utterance {sequence_no} failed: {message}")),
        NarrationEvent::SessionEnded { session_id, reason } => Some(match reason {
            TerminationReason::Completed => format!("■ {session_id} finished"),
            TerminationReason::Stopped => format!("■ {session_id} stopped"),
            TerminationReason::Failed { message } => format!("✗ {session_id} failed: {message}"),
        }),
        NarrationEvent::StartRejected { message } => Some(format!("✗ {message}")),
        NarrationEvent::RecognizerError { code, message } => {
            Some(format!("⚠ recognizer error {code}: {message}"))
        }
    }
}

/// Print an event to stdout if it renders.
pub fn print_event(event: &NarrationEvent, json: bool) {
    if let Some(line) = render_event(event, json) {
        println!("{line}");
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
