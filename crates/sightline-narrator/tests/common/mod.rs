//! Shared mocks for the narration integration tests.
//!
//! All collaborators are driven by tokio's clock, so tests run under
//! `start_paused = true` and finish instantly while still exercising the
//! real timing logic.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sightline_core::ports::{
    CaptureError, GenerationSender, GenerationStream, ImageSource, InferenceError, InferenceProvider, SpeechError,
    SpeechSink,
};
use sightline_core::{
    ChannelObserver, Image, NarrationEvent, NarrationSettings, SessionId, TerminationReason,
};
use sightline_narrator::{ControllerDeps, InferenceGuard, SessionController};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep, timeout};

// ── Mock inference provider ────────────────────────────────────────

/// How a scripted stream ends.
#[derive(Debug, Clone)]
pub enum Ending {
    Finish,
    Fail(String),
    /// Drop the sender without a completion signal.
    Drop,
    /// Keep the stream open until the consumer goes away.
    Hang,
}

/// Timed increments replayed by one `open_stream` call.
#[derive(Debug, Clone)]
pub struct Script {
    pub steps: Vec<(Duration, String)>,
    pub ending: Ending,
}

impl Script {
    /// Emit each increment `every` after the previous one, then finish.
    pub fn paced(every: Duration, increments: &[&str]) -> Self {
        Self {
            steps: increments
                .iter()
                .map(|s| (every, (*s).to_owned()))
                .collect(),
            ending: Ending::Finish,
        }
    }

    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    pub fn full_text(&self) -> String {
        self.steps.iter().map(|(_, s)| s.as_str()).collect()
    }
}

#[derive(Default)]
pub struct MockProvider {
    scripts: Mutex<VecDeque<Script>>,
    pub fail_resets: AtomicBool,
    pub not_ready: AtomicBool,
    pub resets: AtomicUsize,
    /// Resets issued while an earlier run's producer was still going.
    pub overlapping_resets: AtomicUsize,
    /// Producer tasks that have not yet dropped their sender.
    pub live_producers: Arc<AtomicUsize>,
    pub opened: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn with_scripts(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live_producers(&self) -> usize {
        self.live_producers.load(Ordering::SeqCst)
    }

    pub fn overlapping_resets(&self) -> usize {
        self.overlapping_resets.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    fn is_ready(&self) -> bool {
        !self.not_ready.load(Ordering::SeqCst)
    }

    async fn reset(&self) -> Result<(), InferenceError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if self.live_producers() > 0 {
            self.overlapping_resets.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_resets.load(Ordering::SeqCst) {
            return Err(InferenceError::Backend("kv cache corrupted".into()));
        }
        Ok(())
    }

    async fn open_stream(
        &self,
        prompt: &str,
        images: Vec<Image>,
    ) -> Result<GenerationStream, InferenceError> {
        assert_eq!(images.len(), 1, "every session sends exactly one frame");
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_owned());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::paced(Duration::from_millis(100), &["Nothing to see."]));

        let (tx, stream) = GenerationStream::channel(16);
        let live = LiveProducer::enter(&self.live_producers);
        tokio::spawn(async move {
            let _live = live;
            play(tx, script).await;
        });
        Ok(stream)
    }
}

/// Replay `script` into `tx`, stopping early once the consumer is gone.
async fn play(tx: GenerationSender, script: Script) {
    for (wait, text) in script.steps {
        sleep(wait).await;
        if !tx.increment(text).await {
            return;
        }
    }
    match script.ending {
        Ending::Finish => tx.finish().await,
        Ending::Fail(reason) => tx.fail(reason).await,
        Ending::Drop => drop(tx),
        Ending::Hang => {
            while !tx.is_closed() {
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Counts a producer as live until dropped.
struct LiveProducer(Arc<AtomicUsize>);

impl LiveProducer {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for LiveProducer {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Mock speech sink ───────────────────────────────────────────────

/// Records every utterance and takes `per_utterance` to "speak" each.
pub struct RecordingSink {
    per_utterance: Duration,
    spoken: Mutex<Vec<(Instant, String)>>,
    failures: Mutex<VecDeque<(usize, SpeechError)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub cancels: AtomicUsize,
}

impl RecordingSink {
    pub fn new(per_utterance: Duration) -> Arc<Self> {
        Arc::new(Self {
            per_utterance,
            spoken: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        })
    }

    /// Fail the `index`-th (0-based) utterance with `error`.
    pub fn fail_utterance(&self, index: usize, error: SpeechError) {
        self.failures.lock().unwrap().push_back((index, error));
    }

    pub fn utterances(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn first_spoken_at(&self) -> Option<Instant> {
        self.spoken.lock().unwrap().first().map(|(at, _)| *at)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechSink for RecordingSink {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let index = {
            let mut spoken = self.spoken.lock().unwrap();
            spoken.push((Instant::now(), text.to_owned()));
            spoken.len() - 1
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        sleep(self.per_utterance).await;

        let mut failures = self.failures.lock().unwrap();
        match failures.iter().position(|(i, _)| *i == index) {
            Some(pos) => Err(failures.remove(pos).unwrap().1),
            None => Ok(()),
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Mock image source ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockImageSource {
    pub fail: AtomicBool,
    pub captures: AtomicUsize,
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn capture(&self) -> Result<Image, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(50)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::Failed("lens covered".into()));
        }
        Ok(Image::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub controller: SessionController,
    pub provider: Arc<MockProvider>,
    pub sink: Arc<RecordingSink>,
    pub images: Arc<MockImageSource>,
    pub events: UnboundedReceiver<NarrationEvent>,
}

impl Harness {
    pub fn new(provider: Arc<MockProvider>, sink: Arc<RecordingSink>) -> Self {
        Self::with_settings(provider, sink, &NarrationSettings::with_defaults())
    }

    pub fn with_settings(
        provider: Arc<MockProvider>,
        sink: Arc<RecordingSink>,
        settings: &NarrationSettings,
    ) -> Self {
        let images = Arc::new(MockImageSource::default());
        let (observer, events) = ChannelObserver::new();
        let deps = ControllerDeps {
            guard: InferenceGuard::new(Arc::clone(&provider) as Arc<dyn InferenceProvider>),
            sink: Arc::clone(&sink) as Arc<dyn SpeechSink>,
            images: Some(Arc::clone(&images) as Arc<dyn ImageSource>),
            observer: Arc::new(observer),
        };
        let controller = SessionController::spawn(deps, settings).expect("valid settings");
        Self {
            controller,
            provider,
            sink,
            images,
            events,
        }
    }

    /// Collect events until `session` ends, returning them and the reason.
    pub async fn wait_for_end(&mut self, session: SessionId) -> (Vec<NarrationEvent>, TerminationReason) {
        let mut seen = Vec::new();
        let reason = timeout(Duration::from_secs(600), async {
            loop {
                let event = self.events.recv().await.expect("observer channel open");
                let ended = match &event {
                    NarrationEvent::SessionEnded { session_id, reason } if *session_id == session => {
                        Some(reason.clone())
                    }
                    _ => None,
                };
                seen.push(event);
                if let Some(reason) = ended {
                    return reason;
                }
            }
        })
        .await
        .expect("session ended in time");
        // Let the trailing idle snapshot land.
        tokio::task::yield_now().await;
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        (seen, reason)
    }

    pub fn drain(&mut self) -> Vec<NarrationEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }
}

/// Texts of `UtteranceStarted` events, in order, with their sequence numbers.
pub fn utterances_in(events: &[NarrationEvent]) -> Vec<(u64, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            NarrationEvent::UtteranceStarted {
                sequence_no, text, ..
            } => Some((*sequence_no, text.clone())),
            _ => None,
        })
        .collect()
}
