//! Integration tests for the voice command router.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Ending, Harness, MockProvider, RecordingSink, Script};
use sightline_core::{
    ChannelObserver, NarrationError, NarrationEvent, NarrationSettings, SessionPhase,
    TerminationReason,
};
use sightline_narrator::{RecognizerEvent, RouteOutcome, VoiceCommandRouter};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn router_for(h: &Harness) -> (VoiceCommandRouter, mpsc::UnboundedReceiver<NarrationEvent>) {
    let (observer, events) = ChannelObserver::new();
    let router = VoiceCommandRouter::new(
        h.controller.clone(),
        NarrationSettings::with_defaults(),
        Arc::new(observer),
    );
    (router, events)
}

fn hanging() -> Script {
    Script::paced(Duration::from_secs(1), &["Still looking"]).ending(Ending::Hang)
}

#[tokio::test(start_paused = true)]
async fn custom_request_is_embedded_verbatim() {
    let mut h = Harness::new(
        MockProvider::with_scripts([Script::paced(Duration::from_millis(100), &["On the table."])]),
        RecordingSink::new(Duration::from_millis(100)),
    );
    let (mut router, _) = router_for(&h);

    let outcome = router.on_command("  help me find my keys ").await;
    let RouteOutcome::Started(id) = outcome else {
        panic!("expected a started session, got {outcome:?}");
    };
    assert_eq!(router.pending_prompt(), None);

    let (_, reason) = h.wait_for_end(id).await;
    assert_eq!(reason, TerminationReason::Completed);

    let prompts = h.provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("help me find my keys"), "{}", prompts[0]);
    assert_ne!(
        prompts[0],
        NarrationSettings::with_defaults().effective_default_prompt()
    );
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_commands_drive_controller() {
    let h = Harness::new(
        MockProvider::with_scripts([hanging()]),
        RecordingSink::new(Duration::from_millis(100)),
    );
    let (mut router, _) = router_for(&h);

    assert_eq!(router.on_command("   ").await, RouteOutcome::Ignored);

    assert!(matches!(
        router.on_command("START").await,
        RouteOutcome::Started(_)
    ));
    assert_eq!(
        h.provider.prompts().len(),
        0,
        "stream opens after capture, not synchronously"
    );
    sleep(Duration::from_millis(500)).await;
    assert_eq!(
        h.provider.prompts(),
        vec![NarrationSettings::with_defaults()
            .effective_default_prompt()
            .to_owned()]
    );

    assert_eq!(router.on_command(" Stop ").await, RouteOutcome::Stopped(true));
    assert_eq!(router.on_command("stop").await, RouteOutcome::Stopped(false));
    assert_eq!(h.controller.snapshot().phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn custom_request_while_active_is_rejected() {
    let h = Harness::new(
        MockProvider::with_scripts([hanging()]),
        RecordingSink::new(Duration::from_millis(100)),
    );
    let (mut router, _) = router_for(&h);

    assert!(matches!(
        router.on_command("start").await,
        RouteOutcome::Started(_)
    ));
    assert_eq!(
        router.on_command("what color is the car").await,
        RouteOutcome::Rejected(NarrationError::AlreadyActive)
    );
    assert_eq!(router.pending_prompt(), None);
}

#[tokio::test(start_paused = true)]
async fn recognizer_errors_never_stop_a_session() {
    let h = Harness::new(
        MockProvider::with_scripts([hanging()]),
        RecordingSink::new(Duration::from_millis(100)),
    );
    let (mut router, mut events) = router_for(&h);

    let RouteOutcome::Started(id) = router.on_command("start").await else {
        panic!("session did not start");
    };
    let err = router.on_error(7);
    assert_eq!(
        err,
        NarrationError::RecognizerFailure {
            code: 7,
            message: "No match found".to_owned()
        }
    );

    sleep(Duration::from_secs(2)).await;
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.session_id, Some(id));
    assert!(snapshot.phase.is_active());

    assert_eq!(
        events.try_recv().unwrap(),
        NarrationEvent::RecognizerError {
            code: 7,
            message: "No match found".to_owned()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn run_loop_listens_until_cancelled() {
    let mut h = Harness::new(
        MockProvider::with_scripts([hanging()]),
        RecordingSink::new(Duration::from_millis(100)),
    );
    let (router, mut router_events) = router_for(&h);
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(router.run(rx, cancel.clone()));

    tx.send(RecognizerEvent::Command("start".into())).await.unwrap();
    tx.send(RecognizerEvent::Error(6)).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert!(h.controller.snapshot().phase.is_active());

    tx.send(RecognizerEvent::Command("stop".into())).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    cancel.cancel();
    task.await.unwrap();

    let events = h.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        NarrationEvent::SessionEnded {
            reason: TerminationReason::Stopped,
            ..
        }
    )));
    assert!(matches!(
        router_events.try_recv(),
        Ok(NarrationEvent::RecognizerError { code: 6, .. })
    ));
    assert_eq!(h.controller.snapshot().phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn run_loop_ends_when_recognizer_closes() {
    let h = Harness::new(
        MockProvider::with_scripts([]),
        RecordingSink::new(Duration::from_millis(100)),
    );
    let (router, _) = router_for(&h);
    let (tx, rx) = mpsc::channel::<RecognizerEvent>(1);
    drop(tx);

    router.run(rx, CancellationToken::new()).await;
    assert_eq!(h.controller.snapshot().phase, SessionPhase::Idle);
}
