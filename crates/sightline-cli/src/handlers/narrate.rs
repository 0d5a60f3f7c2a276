//! Narrate command handler.
//!
//! Starts one session, prints its events and returns when it ends.
//! Ctrl+C stops the session; the handler still waits for its end event.

use std::pin::pin;

use sightline_core::{NarrationEvent, TerminationReason};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::print_event;

/// Execute the narrate command.
pub async fn execute(mut ctx: CliContext, prompt: Option<String>, json: bool) -> Result<(), CliError> {
    let prompt = prompt.unwrap_or_else(|| ctx.settings.effective_default_prompt().to_owned());

    let session = match ctx.controller.start(prompt).await {
        Ok(id) => id,
        Err(e) => {
            while let Ok(event) = ctx.events.try_recv() {
                print_event(&event, json);
            }
            return Err(e.into());
        }
    };

    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;

    let reason = loop {
        tokio::select! {
            event = ctx.events.recv() => {
                let Some(event) = event else {
                    return Err(CliError::Unavailable("narration events closed".into()));
                };
                print_event(&event, json);
                if let NarrationEvent::SessionEnded { session_id, reason } = event {
                    if session_id == session {
                        break reason;
                    }
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                tracing::info!("Interrupted; stopping narration");
                ctx.controller.stop().await?;
            }
        }
    };

    while let Ok(event) = ctx.events.try_recv() {
        print_event(&event, json);
    }
    ctx.controller.shutdown().await;

    match reason {
        TerminationReason::Completed | TerminationReason::Stopped => Ok(()),
        TerminationReason::Failed { message } => Err(CliError::Narration(message)),
    }
}
