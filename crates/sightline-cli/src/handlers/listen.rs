//! Listen command handler.
//!
//! Treats each stdin line as a final recognition result and feeds it to the
//! voice command router, printing narration events as they arrive. A line
//! of the form `!err N` is delivered as recognizer error code `N`.
//!
//! On EOF the router stops listening and the handler waits for any running
//! session to finish before returning.

use std::pin::pin;
use std::sync::Arc;

use sightline_narrator::{RecognizerEvent, VoiceCommandRouter};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::print_event;

const ERROR_PREFIX: &str = "!err";

/// Execute the listen command.
pub async fn execute(mut ctx: CliContext, json: bool) -> Result<(), CliError> {
    let router = VoiceCommandRouter::new(
        ctx.controller.clone(),
        ctx.settings.clone(),
        Arc::clone(&ctx.observer),
    );
    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let router_task = tokio::spawn(router.run(rx, cancel.clone()));

    if !json {
        eprintln!("Listening. Say `start`, `stop`, or ask for something (Ctrl+D to quit).");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Some(event) = parse_line(&line) {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            Some(event) = ctx.events.recv() => print_event(&event, json),
            _ = &mut ctrl_c => {
                cancel.cancel();
                ctx.controller.stop().await?;
                break;
            }
        }
    }

    drop(tx);
    router_task
        .await
        .map_err(|e| CliError::Narration(format!("command router failed: {e}")))?;

    // Let a session started by the last command run to completion.
    let mut status = ctx.controller.subscribe();
    loop {
        if !status.borrow_and_update().phase.is_active() {
            break;
        }
        tokio::select! {
            Some(event) = ctx.events.recv() => print_event(&event, json),
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    while let Ok(event) = ctx.events.try_recv() {
        print_event(&event, json);
    }
    ctx.controller.shutdown().await;
    Ok(())
}

/// Turn one stdin line into a recognizer event.
fn parse_line(line: &str) -> Option<RecognizerEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(code) = trimmed.strip_prefix(ERROR_PREFIX) {
        if let Ok(code) = code.trim().parse::<i32>() {
            return Some(RecognizerEvent::Error(code));
        }
    }
    Some(RecognizerEvent::Command(line.to_owned()))
}
