//! Playback/generation pipeline
//!
//! A two-slot scheduler: while one utterance plays, audio for the next is
//! generated concurrently (prefetch), hiding synthesis latency. All shared
//! state lives in a single worker task; spawned playback and prefetch tasks
//! report back through an event channel rather than touching state
//! directly. A turn counter makes cancellation safe: events from a stopped
//! turn are ignored, so an engine completion can never race a `stop()`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::Result;
use crate::config::{EnginePreference, SegmentationConfig};
use crate::speech::engine::{AudioClip, AudioSession, NeuralEngine, SystemEngine, VoicePreferences};
use crate::speech::normalize::normalize;
use crate::speech::segmenter::StreamSegmenter;

/// Utterances longer than this are generated in streaming chunks to reduce
/// time-to-first-sound
const STREAMING_CHAR_THRESHOLD: usize = 220;

/// How long the audio session is kept active after the queue drains, so
/// back-to-back utterances do not churn it
const SESSION_IDLE_GRACE: Duration = Duration::from_millis(750);

/// Interval for status polling in [`SpeechPipeline::wait_until_idle`]
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pipeline playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing queued or playing
    #[default]
    Idle,
    /// Synthesizing the current utterance (neural engine only)
    Generating,
    /// Playing the current utterance
    Speaking,
}

/// Observable counters for UI consumption; not behaviorally load-bearing
#[derive(Debug, Default)]
struct SharedStatus {
    queued: AtomicUsize,
    speaking: AtomicBool,
    generating: AtomicBool,
}

/// Commands from the handle to the worker
enum Command {
    Push(String),
    Flush,
    Stop,
    Sync(oneshot::Sender<()>),
}

/// Completions reported by spawned playback/prefetch tasks
enum Event {
    /// Audible output began for the current utterance
    PlaybackStarted { turn: u64 },
    /// The current utterance finished (spoken or skipped)
    Spoke { turn: u64 },
    /// A prefetch task resolved
    Prefetched {
        turn: u64,
        text: String,
        result: Result<AudioClip>,
    },
}

/// Injected collaborators, cheap to clone into tasks
#[derive(Clone)]
struct Engines {
    neural: Arc<dyn NeuralEngine>,
    system: Arc<dyn SystemEngine>,
    prefs: Arc<dyn VoicePreferences>,
    session: Arc<dyn AudioSession>,
}

/// Handle to a running speech pipeline.
///
/// Cloneable; all clones feed the same worker. Dropping every handle stops
/// the worker.
#[derive(Clone)]
pub struct SpeechPipeline {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<SharedStatus>,
}

impl SpeechPipeline {
    /// Spawn the pipeline worker on the current tokio runtime
    #[must_use]
    pub fn spawn(
        segmentation: SegmentationConfig,
        neural: Arc<dyn NeuralEngine>,
        system: Arc<dyn SystemEngine>,
        prefs: Arc<dyn VoicePreferences>,
        session: Arc<dyn AudioSession>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events_tx, event_rx) = mpsc::unbounded_channel();
        let status = Arc::new(SharedStatus::default());

        let worker = Worker {
            segmenter: StreamSegmenter::new(segmentation),
            queue: VecDeque::new(),
            prefetch: None,
            prefetched: None,
            failed_primary: None,
            playback: None,
            state: PlaybackState::Idle,
            turn: 0,
            session_active: false,
            idle_deadline: None,
            engines: Engines {
                neural,
                system,
                prefs,
                session,
            },
            events_tx,
            status: Arc::clone(&status),
        };
        tokio::spawn(worker.run(command_rx, event_rx));

        Self { commands, status }
    }

    /// Append a chunk of streamed response text. Never blocks.
    pub fn push(&self, chunk: &str) {
        let _ = self.commands.send(Command::Push(chunk.to_string()));
    }

    /// The response stream is complete; speak everything still buffered
    pub fn flush(&self) {
        let _ = self.commands.send(Command::Flush);
    }

    /// Cancel the turn: abort generation and playback, discard all queued
    /// and pending text. Safe to call in any state; idempotent.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Utterances queued and not yet spoken
    #[must_use]
    pub fn queued(&self) -> usize {
        self.status.queued.load(Ordering::Relaxed)
    }

    /// Whether an utterance is currently playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.status.speaking.load(Ordering::Relaxed)
    }

    /// Whether the neural engine is synthesizing the current utterance
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.status.generating.load(Ordering::Relaxed)
    }

    /// Whether the pipeline is fully drained
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queued() == 0 && !self.is_speaking() && !self.is_generating()
    }

    /// Wait until every command sent so far is processed and playback has
    /// drained
    pub async fn wait_until_idle(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Sync(ack)).is_err() {
            return;
        }
        let _ = done.await;

        while !self.is_idle() {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }
}

/// Owns all mutable pipeline state; the single serialization point
struct Worker {
    segmenter: StreamSegmenter,
    queue: VecDeque<String>,
    /// In-flight prefetch task and the text it is generating
    prefetch: Option<(String, JoinHandle<()>)>,
    /// Generated-ahead audio, valid only while its text is the queue head
    prefetched: Option<(String, AudioClip)>,
    /// Queue head that already failed primary synthesis; do not retry it
    failed_primary: Option<String>,
    playback: Option<JoinHandle<()>>,
    state: PlaybackState,
    turn: u64,
    session_active: bool,
    idle_deadline: Option<Instant>,
    engines: Engines,
    events_tx: mpsc::UnboundedSender<Event>,
    status: Arc<SharedStatus>,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            let deadline = self.idle_deadline;
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Push(text)) => self.on_push(&text).await,
                    Some(Command::Flush) => self.on_flush().await,
                    Some(Command::Stop) => self.on_stop().await,
                    Some(Command::Sync(ack)) => {
                        let _ = ack.send(());
                    }
                    None => {
                        self.on_stop().await;
                        break;
                    }
                },
                Some(event) = events.recv() => self.on_event(event).await,
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    self.on_idle_deadline().await;
                }
            }
        }
    }

    async fn on_push(&mut self, chunk: &str) {
        let segments = self.segmenter.push(chunk);
        self.enqueue(segments).await;
    }

    async fn on_flush(&mut self) {
        let segments = self.segmenter.flush();
        self.enqueue(segments).await;
    }

    /// Normalize exactly once per utterance, at enqueue time
    async fn enqueue(&mut self, segments: Vec<String>) {
        for segment in segments {
            let utterance = normalize(&segment);
            if !utterance.trim().is_empty() {
                self.queue.push_back(utterance);
            }
        }
        self.sync_status();
        self.pump().await;
    }

    /// Start playback if idle, otherwise make sure a prefetch is running
    async fn pump(&mut self) {
        if self.state == PlaybackState::Idle {
            if !self.queue.is_empty() {
                self.start_utterance().await;
            }
        } else {
            self.maybe_start_prefetch();
        }
    }

    async fn start_utterance(&mut self) {
        let Some(text) = self.queue.pop_front() else {
            return;
        };
        self.idle_deadline = None;

        if !self.session_active {
            match self.engines.session.activate().await {
                Ok(()) => self.session_active = true,
                Err(e) => tracing::warn!(error = %e, "audio session activation failed"),
            }
        }

        // A cached clip is only usable if it was generated for exactly
        // this text
        let cached = match self.prefetched.take() {
            Some((prefetch_text, clip)) if prefetch_text == text => Some(clip),
            Some(_) => {
                tracing::trace!("discarding stale prefetched audio");
                None
            }
            None => None,
        };

        // An unfinished prefetch for this same text is wasted work now
        if self.prefetch.as_ref().is_some_and(|(t, _)| *t == text) {
            if let Some((_, handle)) = self.prefetch.take() {
                handle.abort();
            }
        }

        let skip_primary = self
            .failed_primary
            .take()
            .is_some_and(|failed| failed == text);
        let use_neural = !skip_primary
            && self.engines.prefs.engine() == EnginePreference::Neural
            && self.engines.neural.is_ready();

        self.state = if use_neural && cached.is_none() {
            PlaybackState::Generating
        } else {
            PlaybackState::Speaking
        };
        self.sync_status();

        let turn = self.turn;
        tracing::debug!(
            turn,
            words = text.split_whitespace().count(),
            neural = use_neural,
            prefetched = cached.is_some(),
            "speaking utterance"
        );

        let engines = self.engines.clone();
        let events = self.events_tx.clone();
        self.playback = Some(tokio::spawn(async move {
            speak_utterance(&engines, &text, cached, use_neural, turn, &events).await;
            let _ = events.send(Event::Spoke { turn });
        }));

        self.maybe_start_prefetch();
    }

    /// Generate audio for the next queued utterance while the current one
    /// plays. Only the neural engine generates offline, so only it can
    /// prefetch.
    fn maybe_start_prefetch(&mut self) {
        if self.state == PlaybackState::Idle || self.prefetch.is_some() {
            return;
        }
        if self.engines.prefs.engine() != EnginePreference::Neural
            || !self.engines.neural.is_ready()
        {
            return;
        }
        let Some(next) = self.queue.front().cloned() else {
            return;
        };
        if self.prefetched.as_ref().is_some_and(|(t, _)| *t == next) {
            return;
        }
        self.prefetched = None;
        if self.failed_primary.as_deref() == Some(next.as_str()) {
            return;
        }

        let turn = self.turn;
        let neural = Arc::clone(&self.engines.neural);
        let speed = self.engines.prefs.rate();
        let events = self.events_tx.clone();
        let text = next.clone();
        tracing::trace!(turn, "prefetching next utterance");
        let handle = tokio::spawn(async move {
            let result = neural.generate(&text, speed).await;
            let _ = events.send(Event::Prefetched { turn, text, result });
        });
        self.prefetch = Some((next, handle));
    }

    async fn on_event(&mut self, event: Event) {
        match event {
            Event::PlaybackStarted { turn } if turn == self.turn => {
                if self.state == PlaybackState::Generating {
                    self.state = PlaybackState::Speaking;
                    self.sync_status();
                }
            }
            Event::Spoke { turn } if turn == self.turn => {
                self.playback = None;
                if self.queue.is_empty() {
                    self.state = PlaybackState::Idle;
                    self.sync_status();
                    self.idle_deadline = Some(Instant::now() + SESSION_IDLE_GRACE);
                } else {
                    self.start_utterance().await;
                }
            }
            Event::Prefetched { turn, text, result } if turn == self.turn => {
                self.prefetch = None;
                match result {
                    Ok(clip) if self.queue.front() == Some(&text) => {
                        self.prefetched = Some((text, clip));
                    }
                    Ok(_) => tracing::trace!("discarding prefetch for changed queue head"),
                    Err(e) => {
                        tracing::warn!(error = %e, "prefetch failed; will use fallback engine");
                        if self.queue.front() == Some(&text) {
                            self.failed_primary = Some(text);
                        }
                    }
                }
            }
            // Completion from a turn that was stopped; must be ignored
            Event::PlaybackStarted { .. } | Event::Spoke { .. } | Event::Prefetched { .. } => {
                tracing::trace!("ignoring event from cancelled turn");
            }
        }
    }

    async fn on_stop(&mut self) {
        self.turn += 1;
        if let Some(handle) = self.playback.take() {
            handle.abort();
        }
        if let Some((_, handle)) = self.prefetch.take() {
            handle.abort();
        }
        self.prefetched = None;
        self.failed_primary = None;
        self.queue.clear();
        self.segmenter.reset();
        self.state = PlaybackState::Idle;
        self.idle_deadline = None;
        self.sync_status();

        self.engines.neural.stop().await;
        self.engines.system.stop().await;

        if self.session_active {
            self.engines.session.deactivate().await;
            self.session_active = false;
        }
        tracing::debug!(turn = self.turn, "pipeline stopped");
    }

    async fn on_idle_deadline(&mut self) {
        self.idle_deadline = None;
        if self.state == PlaybackState::Idle && self.queue.is_empty() && self.session_active {
            self.engines.session.deactivate().await;
            self.session_active = false;
            tracing::debug!("audio session released after idle grace");
        }
    }

    fn sync_status(&self) {
        self.status.queued.store(self.queue.len(), Ordering::Relaxed);
        self.status
            .speaking
            .store(self.state == PlaybackState::Speaking, Ordering::Relaxed);
        self.status
            .generating
            .store(self.state == PlaybackState::Generating, Ordering::Relaxed);
    }
}

/// Speak one utterance to completion. Primary-engine failures fall back to
/// the secondary engine for this utterance only; the pipeline moves on
/// either way.
async fn speak_utterance(
    engines: &Engines,
    text: &str,
    cached: Option<AudioClip>,
    use_neural: bool,
    turn: u64,
    events: &mpsc::UnboundedSender<Event>,
) {
    if use_neural {
        match speak_neural(engines, text, cached, turn, events).await {
            Ok(()) => return,
            Err(e) => tracing::warn!(error = %e, "neural synthesis failed; falling back"),
        }
    }

    let _ = events.send(Event::PlaybackStarted { turn });
    let voice = engines.prefs.voice();
    if let Err(e) = engines
        .system
        .speak(
            text,
            voice.as_deref(),
            engines.prefs.rate(),
            engines.prefs.pitch(),
        )
        .await
    {
        tracing::warn!(error = %e, "fallback engine failed; skipping utterance");
    }
}

async fn speak_neural(
    engines: &Engines,
    text: &str,
    cached: Option<AudioClip>,
    turn: u64,
    events: &mpsc::UnboundedSender<Event>,
) -> Result<()> {
    let speed = engines.prefs.rate();

    if let Some(clip) = cached {
        let _ = events.send(Event::PlaybackStarted { turn });
        return engines.neural.play(clip).await;
    }

    if text.len() > STREAMING_CHAR_THRESHOLD {
        let mut stream = engines.neural.generate_streaming(text, speed).await?;
        let mut started = false;
        while let Some(chunk) = stream.next().await {
            let clip = chunk?;
            if !started {
                started = true;
                let _ = events.send(Event::PlaybackStarted { turn });
            }
            engines.neural.play(clip).await?;
        }
        if !started {
            let _ = events.send(Event::PlaybackStarted { turn });
        }
        return Ok(());
    }

    let clip = engines.neural.generate(text, speed).await?;
    let _ = events.send(Event::PlaybackStarted { turn });
    engines.neural.play(clip).await
}
