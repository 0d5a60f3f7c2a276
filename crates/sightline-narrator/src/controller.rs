//! Session controller: owns the narration lifecycle.
//!
//! The controller is a single tokio task (the actor) that owns every piece of
//! session state: the phase, the narration buffer, the speech dispatcher and
//! the handles of the tasks holding the inference lease. Everything else
//! talks to it through messages:
//!
//! ```text
//!   SessionController ──ControlMsg──►┐
//!                                    │
//!   prepare task ──JoinHandle───────►├──► actor ──► observer / watch
//!                                    │
//!   pump / speak / timer tasks ──────┘
//!        (SessionMsg, tagged with SessionId)
//! ```
//!
//! Lifecycle:
//!
//! ```text
//!   Idle → Capturing → Generating → Speaking → Terminated → Idle
//!              │            │           │
//!              └────────────┴───────────┴──► stop / error
//! ```
//!
//! Each session owns a [`CancellationToken`]. Every task spawned on behalf of
//! the session selects on it, so `stop()` abandons pending waits
//! immediately. Callbacks that were already queued carry the old
//! [`SessionId`] and are discarded when they reach the actor.
//!
//! The inference lease lives at least as long as the backend run it guards.
//! The preparation task holds it through capture, reset and stream opening.
//! The pump task then holds it until the stream is closed *and* the
//! provider's producer has stopped. Ending a session waits up to
//! [`HANDLE_RELEASE_TIMEOUT`] for that hand-back; a run that keeps going
//! longer keeps the handle busy until it actually ends.

use std::sync::Arc;
use std::time::Duration;

use sightline_core::ports::{
    GenerationChunk, GenerationOutcome, GenerationStream, ImageSource, NarrationObserver,
    SpeechError, SpeechSink,
};
use sightline_core::{
    NarrationError, NarrationEvent, NarrationSettings, NarrationSnapshot, SessionId, SessionPhase,
    SpeechSpan, TerminationReason, validate_settings,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::NarrationBuffer;
use crate::dispatcher::{DispatchAction, SpeechDispatcher};
use crate::guard::{InferenceGuard, InferenceLease};

const COMMAND_QUEUE_CAPACITY: usize = 32;

/// How long ending a session waits for the backend run to let go of the handle.
pub const HANDLE_RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

// ── Collaborators ──────────────────────────────────────────────────

/// Everything the controller needs from the outside world.
#[derive(Clone)]
pub struct ControllerDeps {
    /// Arbiter for the shared inference handle.
    pub guard: InferenceGuard,
    /// Serialized speech output.
    pub sink: Arc<dyn SpeechSink>,
    /// Frame source. `None` when no camera is wired up.
    pub images: Option<Arc<dyn ImageSource>>,
    /// Receives every [`NarrationEvent`].
    pub observer: Arc<dyn NarrationObserver>,
}

// ── Messages ───────────────────────────────────────────────────────

/// Requests from [`SessionController`] handles.
enum ControlMsg {
    Start {
        prompt: String,
        reply: oneshot::Sender<Result<SessionId, NarrationError>>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Callbacks from tasks spawned for a session.
#[derive(Debug)]
enum SessionMsg {
    Increment {
        session: SessionId,
        text: String,
    },
    GenerationFinished {
        session: SessionId,
        outcome: GenerationOutcome,
    },
    DelayElapsed {
        session: SessionId,
    },
    PollElapsed {
        session: SessionId,
    },
    UtteranceFinished {
        session: SessionId,
        sequence_no: u64,
        result: Result<(), SpeechError>,
    },
}

impl SessionMsg {
    const fn session(&self) -> SessionId {
        match self {
            Self::Increment { session, .. }
            | Self::GenerationFinished { session, .. }
            | Self::DelayElapsed { session }
            | Self::PollElapsed { session }
            | Self::UtteranceFinished { session, .. } => *session,
        }
    }
}

/// Output of the preparation task: a held lease and an open stream.
struct Prepared {
    lease: InferenceLease,
    stream: GenerationStream,
}

/// `None` when the session was cancelled while preparing.
type PrepareResult = Option<Result<Prepared, NarrationError>>;

enum ActorEvent {
    Control(ControlMsg),
    Session(SessionMsg),
    Prepared(SessionId, Result<PrepareResult, JoinError>),
    Closed,
}

// ── Public handle ──────────────────────────────────────────────────

/// Cloneable handle to the session controller task.
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::Sender<ControlMsg>,
    status: watch::Receiver<NarrationSnapshot>,
    guard: InferenceGuard,
}

impl SessionController {
    /// Validate `settings` and spawn the controller task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(deps: ControllerDeps, settings: &NarrationSettings) -> Result<Self, NarrationError> {
        validate_settings(settings)?;

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (callbacks_tx, callbacks_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(NarrationSnapshot::default());
        let guard = deps.guard.clone();

        let actor = ControllerActor {
            deps,
            first_speech_delay: settings.effective_first_speech_delay(),
            poll_interval: settings.effective_poll_interval(),
            commands: commands_rx,
            callbacks_tx,
            callbacks: callbacks_rx,
            status: status_tx,
            active: None,
            next_session: 0,
            last_error: None,
        };
        tokio::spawn(actor.run());

        Ok(Self {
            commands: commands_tx,
            status: status_rx,
            guard,
        })
    }

    /// Begin a narration session with `prompt`.
    ///
    /// Rejections (`AlreadyActive`, `HandleUnusable`, `HandleBusy`,
    /// `CaptureUnavailable`) leave all state untouched.
    pub async fn start(&self, prompt: impl Into<String>) -> Result<SessionId, NarrationError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlMsg::Start {
            prompt: prompt.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NarrationError::ControllerClosed)?
    }

    /// Stop the active session. Returns `false` if nothing was active.
    ///
    /// Waits for the backend run to release the inference handle, for at
    /// most [`HANDLE_RELEASE_TIMEOUT`]. Past that the session still ends but
    /// the handle stays busy until the run stops.
    pub async fn stop(&self) -> Result<bool, NarrationError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlMsg::Stop { reply }).await?;
        rx.await.map_err(|_| NarrationError::ControllerClosed)
    }

    /// Stop any active session and end the controller task.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(ControlMsg::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> NarrationSnapshot {
        self.status.borrow().clone()
    }

    /// Watch channel carrying every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<NarrationSnapshot> {
        self.status.clone()
    }

    /// The inference guard this controller arbitrates through.
    pub const fn guard(&self) -> &InferenceGuard {
        &self.guard
    }

    async fn send(&self, msg: ControlMsg) -> Result<(), NarrationError> {
        self.commands
            .send(msg)
            .await
            .map_err(|_| NarrationError::ControllerClosed)
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("snapshot", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

// ── Actor ──────────────────────────────────────────────────────────

struct ActiveSession {
    id: SessionId,
    phase: SessionPhase,
    cancel: CancellationToken,
    /// Capture + reset + open stream. Holds the lease until it completes.
    prepare: Option<JoinHandle<PrepareResult>>,
    /// Stream forwarding. Holds the lease until the producer has stopped.
    pump: Option<JoinHandle<()>>,
    buffer: NarrationBuffer,
    dispatcher: SpeechDispatcher,
    generation_done: bool,
}

struct ControllerActor {
    deps: ControllerDeps,
    first_speech_delay: Duration,
    poll_interval: Duration,
    commands: mpsc::Receiver<ControlMsg>,
    callbacks_tx: mpsc::UnboundedSender<SessionMsg>,
    callbacks: mpsc::UnboundedReceiver<SessionMsg>,
    status: watch::Sender<NarrationSnapshot>,
    active: Option<ActiveSession>,
    next_session: u64,
    last_error: Option<String>,
}

impl ControllerActor {
    async fn run(mut self) {
        debug!("Session controller started");
        loop {
            let event = tokio::select! {
                msg = self.commands.recv() => msg.map_or(ActorEvent::Closed, ActorEvent::Control),
                Some(msg) = self.callbacks.recv() => ActorEvent::Session(msg),
                (session, joined) = wait_prepared(&mut self.active) => ActorEvent::Prepared(session, joined),
            };

            match event {
                ActorEvent::Control(ControlMsg::Start { prompt, reply }) => {
                    let result = self.handle_start(prompt);
                    let _ = reply.send(result);
                }
                ActorEvent::Control(ControlMsg::Stop { reply }) => {
                    let stopped = self.handle_stop().await;
                    let _ = reply.send(stopped);
                }
                ActorEvent::Control(ControlMsg::Shutdown { reply }) => {
                    self.handle_stop().await;
                    let _ = reply.send(());
                    break;
                }
                ActorEvent::Session(msg) => self.handle_session_msg(msg).await,
                ActorEvent::Prepared(session, joined) => self.handle_prepared(session, joined).await,
                ActorEvent::Closed => {
                    self.handle_stop().await;
                    break;
                }
            }
        }
        debug!("Session controller stopped");
    }

    // ── User actions ───────────────────────────────────────────────

    fn handle_start(&mut self, prompt: String) -> Result<SessionId, NarrationError> {
        let result = self.try_start(prompt);
        if let Err(ref e) = result {
            warn!(error = %e, "Narration start rejected");
            self.deps.observer.emit(NarrationEvent::StartRejected {
                message: e.user_message(),
            });
        }
        result
    }

    fn try_start(&mut self, prompt: String) -> Result<SessionId, NarrationError> {
        if self.active.is_some() {
            return Err(NarrationError::AlreadyActive);
        }
        let lease = self.deps.guard.try_acquire()?;
        let Some(images) = self.deps.images.clone() else {
            return Err(NarrationError::CaptureUnavailable);
        };

        self.next_session += 1;
        let id = SessionId::new(self.next_session);
        let cancel = CancellationToken::new();
        let prepare = tokio::spawn(prepare_stream(
            lease,
            images,
            prompt.clone(),
            cancel.clone(),
        ));

        self.active = Some(ActiveSession {
            id,
            phase: SessionPhase::Capturing,
            cancel,
            prepare: Some(prepare),
            pump: None,
            buffer: NarrationBuffer::new(),
            dispatcher: SpeechDispatcher::new(),
            generation_done: false,
        });
        self.last_error = None;

        info!(session = %id, "Narration session started");
        self.deps.observer.emit(NarrationEvent::SessionStarted {
            session_id: id,
            prompt,
        });
        self.publish();
        Ok(id)
    }

    async fn handle_stop(&mut self) -> bool {
        if self.active.is_none() {
            debug!("Stop requested with no active session");
            return false;
        }
        self.end_session(TerminationReason::Stopped).await;
        true
    }

    // ── Preparation ────────────────────────────────────────────────

    async fn handle_prepared(&mut self, session: SessionId, joined: Result<PrepareResult, JoinError>) {
        let Some(active) = self.active.as_mut().filter(|a| a.id == session) else {
            return;
        };
        active.prepare = None;

        let prepared = match joined {
            Ok(Some(Ok(prepared))) => prepared,
            Ok(Some(Err(e))) => {
                self.fail_session(&e).await;
                return;
            }
            Ok(None) => {
                debug!(session = %session, "Preparation cancelled");
                return;
            }
            Err(e) => {
                self.fail_session(&NarrationError::StreamFailure(format!(
                    "preparation task failed: {e}"
                )))
                .await;
                return;
            }
        };

        active.phase = SessionPhase::Generating;
        let cancel = active.cancel.clone();
        debug!(session = %session, "Generation stream open");

        active.pump = Some(tokio::spawn(pump_stream(
            session,
            prepared.stream,
            prepared.lease,
            self.callbacks_tx.clone(),
            cancel.clone(),
        )));
        spawn_timer(
            self.first_speech_delay,
            SessionMsg::DelayElapsed { session },
            self.callbacks_tx.clone(),
            cancel,
        );
        self.publish();
    }

    // ── Session callbacks ──────────────────────────────────────────

    async fn handle_session_msg(&mut self, msg: SessionMsg) {
        let session = msg.session();
        let Some(active) = self.active.as_mut().filter(|a| a.id == session) else {
            debug!(session = %session, ?msg, "Discarding callback for inactive session");
            return;
        };

        match msg {
            SessionMsg::Increment { text, .. } => {
                if active.buffer.append(&text).is_err() {
                    debug!(session = %session, "Increment after seal ignored");
                    return;
                }
                self.publish();
                self.pump_speech().await;
            }
            SessionMsg::GenerationFinished { outcome, .. } => {
                active.generation_done = true;
                match outcome {
                    GenerationOutcome::Finished => {
                        debug!(session = %session, len = active.buffer.text().len(), "Generation complete");
                        active.phase = SessionPhase::Speaking;
                        self.publish();
                        self.pump_speech().await;
                    }
                    GenerationOutcome::Failed(reason) => {
                        self.fail_session(&NarrationError::StreamFailure(reason)).await;
                    }
                }
            }
            SessionMsg::DelayElapsed { .. } => {
                debug!(session = %session, "First-speech delay elapsed");
                active.dispatcher.on_delay_elapsed();
                self.pump_speech().await;
            }
            SessionMsg::PollElapsed { .. } => {
                active.dispatcher.on_poll_elapsed();
                self.pump_speech().await;
            }
            SessionMsg::UtteranceFinished {
                sequence_no,
                result,
                ..
            } => {
                if let Err(e) = active.dispatcher.on_utterance_finished(sequence_no) {
                    warn!(session = %session, error = %e, "Ignoring unexpected utterance completion");
                    return;
                }
                match result {
                    Ok(()) => {
                        self.deps.observer.emit(NarrationEvent::UtteranceFinished {
                            session_id: session,
                            sequence_no,
                        });
                    }
                    Err(e) if e.is_fatal() => {
                        self.fail_session(&NarrationError::SinkFailure(e.to_string()))
                            .await;
                        return;
                    }
                    Err(e) => {
                        warn!(session = %session, seq = sequence_no, error = %e, "Utterance failed; continuing");
                        self.deps.observer.emit(NarrationEvent::SpeechWarning {
                            session_id: session,
                            sequence_no,
                            message: e.to_string(),
                        });
                    }
                }
                self.publish();
                self.pump_speech().await;
            }
        }
    }

    // ── Speech loop ────────────────────────────────────────────────

    async fn pump_speech(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let session = active.id;

        match active
            .dispatcher
            .next_action(&mut active.buffer, active.generation_done)
        {
            DispatchAction::Hold | DispatchAction::Busy => {}
            DispatchAction::Speak(span) => {
                let cancel = active.cancel.clone();
                self.speak(session, span, cancel);
            }
            DispatchAction::Wait => {
                if active.dispatcher.arm_poll() {
                    spawn_timer(
                        self.poll_interval,
                        SessionMsg::PollElapsed { session },
                        self.callbacks_tx.clone(),
                        active.cancel.clone(),
                    );
                }
            }
            DispatchAction::Finished => {
                self.end_session(TerminationReason::Completed).await;
            }
        }
    }

    fn speak(&self, session: SessionId, span: SpeechSpan, cancel: CancellationToken) {
        debug!(session = %session, seq = span.sequence_no, len = span.text.len(), "Dispatching utterance");
        self.deps.observer.emit(NarrationEvent::UtteranceStarted {
            session_id: session,
            sequence_no: span.sequence_no,
            text: span.text.clone(),
        });

        let sink = Arc::clone(&self.deps.sink);
        let tx = self.callbacks_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    sink.cancel();
                    return;
                }
                result = sink.speak(&span.text) => result,
            };
            let _ = tx.send(SessionMsg::UtteranceFinished {
                session,
                sequence_no: span.sequence_no,
                result,
            });
        });
        self.publish();
    }

    // ── Termination ────────────────────────────────────────────────

    async fn fail_session(&mut self, err: &NarrationError) {
        if let Some(active) = &self.active {
            error!(session = %active.id, error = %err, "Narration session failed");
        }
        self.end_session(TerminationReason::Failed {
            message: err.to_string(),
        })
        .await;
    }

    async fn end_session(&mut self, reason: TerminationReason) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();
        if let Some(prepare) = active.prepare.take() {
            // Finished but not yet picked up by the run loop: its stream
            // still has to be retired before the lease goes back.
            if let Some(Ok(Some(Ok(prepared)))) = join_retiring(active.id, prepare).await {
                let retiring = tokio::spawn(retire(prepared.stream, prepared.lease));
                join_retiring(active.id, retiring).await;
            }
        }
        if let Some(pump) = active.pump.take() {
            join_retiring(active.id, pump).await;
        }
        active.buffer.clear();

        match &reason {
            TerminationReason::Completed => info!(session = %active.id, "Narration session completed"),
            TerminationReason::Stopped => info!(session = %active.id, "Narration session stopped"),
            TerminationReason::Failed { .. } => {}
        }
        self.last_error = match &reason {
            TerminationReason::Failed { message } => Some(message.clone()),
            TerminationReason::Completed | TerminationReason::Stopped => None,
        };

        self.publish_snapshot(NarrationSnapshot {
            session_id: Some(active.id),
            phase: SessionPhase::Terminated,
            error: self.last_error.clone(),
            ..NarrationSnapshot::default()
        });
        self.deps.observer.emit(NarrationEvent::SessionEnded {
            session_id: active.id,
            reason,
        });
        self.publish();
    }

    // ── Snapshots ──────────────────────────────────────────────────

    fn current_snapshot(&self) -> NarrationSnapshot {
        match &self.active {
            Some(active) => NarrationSnapshot {
                session_id: Some(active.id),
                phase: active.phase,
                generated_text: active.buffer.text().to_owned(),
                is_generating: active.phase == SessionPhase::Generating && !active.generation_done,
                is_speaking: active.dispatcher.is_speaking(),
                error: None,
            },
            None => NarrationSnapshot {
                error: self.last_error.clone(),
                ..NarrationSnapshot::default()
            },
        }
    }

    fn publish(&self) {
        self.publish_snapshot(self.current_snapshot());
    }

    /// Publish to the watch channel and the observer, skipping no-op updates.
    fn publish_snapshot(&self, snapshot: NarrationSnapshot) {
        if *self.status.borrow() == snapshot {
            return;
        }
        self.status.send_replace(snapshot.clone());
        self.deps.observer.emit(NarrationEvent::Snapshot(snapshot));
    }
}

// ── Session tasks ──────────────────────────────────────────────────

/// Resolve once the active session's preparation task has finished.
async fn wait_prepared(
    active: &mut Option<ActiveSession>,
) -> (SessionId, Result<PrepareResult, JoinError>) {
    let Some(session) = active.as_mut() else {
        return std::future::pending().await;
    };
    let id = session.id;
    let Some(handle) = session.prepare.as_mut() else {
        return std::future::pending().await;
    };
    (id, handle.await)
}

/// Capture a frame, reset the handle and open the generation stream.
///
/// Only the capture is abandoned on cancellation. Reset and open run to
/// completion once begun, with the lease held throughout.
async fn prepare_stream(
    mut lease: InferenceLease,
    images: Arc<dyn ImageSource>,
    prompt: String,
    cancel: CancellationToken,
) -> PrepareResult {
    match open_fresh_stream(&mut lease, images.as_ref(), &prompt, &cancel).await {
        Ok(Some(stream)) if cancel.is_cancelled() => {
            retire(stream, lease).await;
            None
        }
        Ok(Some(stream)) => Some(Ok(Prepared { lease, stream })),
        Ok(None) => None,
        Err(e) => Some(Err(e)),
    }
}

async fn open_fresh_stream(
    lease: &mut InferenceLease,
    images: &dyn ImageSource,
    prompt: &str,
    cancel: &CancellationToken,
) -> Result<Option<GenerationStream>, NarrationError> {
    let captured = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(None),
        captured = images.capture() => captured,
    };
    let image = captured.map_err(|e| NarrationError::CaptureFailed(e.to_string()))?;
    debug!(?image, "Frame captured");
    if cancel.is_cancelled() {
        return Ok(None);
    }
    lease.reset_if_idle().await?;
    if cancel.is_cancelled() {
        return Ok(None);
    }
    lease.open_stream(prompt, vec![image]).await.map(Some)
}

/// Forward stream chunks to the actor until completion or cancellation,
/// then retire the stream.
async fn pump_stream(
    session: SessionId,
    mut stream: GenerationStream,
    lease: InferenceLease,
    tx: mpsc::UnboundedSender<SessionMsg>,
    cancel: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            chunk = stream.next() => chunk,
        };
        let msg = match chunk {
            Some(GenerationChunk::Increment(text)) => SessionMsg::Increment { session, text },
            Some(GenerationChunk::Done(outcome)) => SessionMsg::GenerationFinished { session, outcome },
            None => break,
        };
        let done = matches!(msg, SessionMsg::GenerationFinished { .. });
        if tx.send(msg).is_err() || done {
            break;
        }
    }
    retire(stream, lease).await;
}

/// Close `stream`, wait for its producer to stop, then give the handle back.
async fn retire(stream: GenerationStream, lease: InferenceLease) {
    stream.close().await;
    lease.release();
}

/// Wait a bounded time for a cancelled session task to finish.
///
/// A task that is still running afterwards is detached. It keeps its lease,
/// so the handle reports busy until the backend run really ends.
async fn join_retiring<T>(session: SessionId, task: JoinHandle<T>) -> Option<Result<T, JoinError>> {
    let joined = tokio::time::timeout(HANDLE_RELEASE_TIMEOUT, task).await.ok();
    if joined.is_none() {
        warn!(
            session = %session,
            timeout = ?HANDLE_RELEASE_TIMEOUT,
            "Backend run still active after session end; inference handle stays busy"
        );
    }
    joined
}

fn spawn_timer(
    after: Duration,
    msg: SessionMsg,
    tx: mpsc::UnboundedSender<SessionMsg>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(after) => {
                let _ = tx.send(msg);
            }
        }
    });
}
