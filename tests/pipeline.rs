//! Playback/generation pipeline tests with mock engines
//!
//! No audio hardware or real synthesis involved: mock engines record what
//! they were asked to speak, and clips carry their source text as bytes so
//! playback order can be asserted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::Notify;

use sotto::speech::{
    AudioClip, AudioSession, NeuralEngine, StaticPreferences, SystemEngine, UnavailableNeural,
};
use sotto::{EnginePreference, Error, Result, SegmentationConfig, SpeechPipeline, VoiceConfig};

fn preferences(engine: EnginePreference, rate: f32) -> Arc<StaticPreferences> {
    Arc::new(StaticPreferences::new(VoiceConfig {
        engine,
        rate,
        voice: None,
        pitch: 1.0,
    }))
}

fn clip_of(text: &str) -> AudioClip {
    AudioClip {
        bytes: text.as_bytes().to_vec(),
    }
}

/// Neural engine that synthesizes instantly and records playback order
#[derive(Default)]
struct RecordingNeural {
    generated: Arc<Mutex<Vec<String>>>,
    played: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl NeuralEngine for RecordingNeural {
    fn is_ready(&self) -> bool {
        true
    }

    async fn generate(&self, text: &str, _speed: f32) -> Result<AudioClip> {
        self.generated.lock().unwrap().push(text.to_string());
        Ok(clip_of(text))
    }

    async fn generate_streaming(
        &self,
        text: &str,
        _speed: f32,
    ) -> Result<BoxStream<'static, Result<AudioClip>>> {
        self.generated.lock().unwrap().push(text.to_string());
        Ok(stream::iter(vec![Ok(clip_of(text))]).boxed())
    }

    async fn play(&self, clip: AudioClip) -> Result<()> {
        // A little real time so prefetch genuinely overlaps playback
        tokio::time::sleep(Duration::from_millis(5)).await;
        let text = String::from_utf8(clip.bytes).unwrap_or_default();
        self.played.lock().unwrap().push(text);
        Ok(())
    }

    async fn stop(&self) {}
}

/// Neural engine that is ready but fails every synthesis
struct BrokenNeural;

#[async_trait]
impl NeuralEngine for BrokenNeural {
    fn is_ready(&self) -> bool {
        true
    }

    async fn generate(&self, _text: &str, _speed: f32) -> Result<AudioClip> {
        Err(Error::Generation("model exploded".to_string()))
    }

    async fn generate_streaming(
        &self,
        _text: &str,
        _speed: f32,
    ) -> Result<BoxStream<'static, Result<AudioClip>>> {
        Err(Error::Generation("model exploded".to_string()))
    }

    async fn play(&self, _clip: AudioClip) -> Result<()> {
        Err(Error::Generation("model exploded".to_string()))
    }

    async fn stop(&self) {}
}

/// Neural engine whose first generate call hangs until aborted;
/// later calls succeed instantly
struct StallOnceNeural {
    first: AtomicBool,
    entered: Arc<Notify>,
    played: Arc<Mutex<Vec<String>>>,
}

impl StallOnceNeural {
    fn new(entered: Arc<Notify>, played: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            first: AtomicBool::new(true),
            entered,
            played,
        }
    }
}

#[async_trait]
impl NeuralEngine for StallOnceNeural {
    fn is_ready(&self) -> bool {
        true
    }

    async fn generate(&self, text: &str, _speed: f32) -> Result<AudioClip> {
        if self.first.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            std::future::pending::<()>().await;
        }
        Ok(clip_of(text))
    }

    async fn generate_streaming(
        &self,
        text: &str,
        speed: f32,
    ) -> Result<BoxStream<'static, Result<AudioClip>>> {
        let clip = self.generate(text, speed).await?;
        Ok(stream::iter(vec![Ok(clip)]).boxed())
    }

    async fn play(&self, clip: AudioClip) -> Result<()> {
        let text = String::from_utf8(clip.bytes).unwrap_or_default();
        self.played.lock().unwrap().push(text);
        Ok(())
    }

    async fn stop(&self) {}
}

/// Fallback engine that records text and rate for every utterance
#[derive(Default)]
struct RecordingSystem {
    spoken: Arc<Mutex<Vec<(String, f32)>>>,
}

#[async_trait]
impl SystemEngine for RecordingSystem {
    async fn speak(&self, text: &str, _voice: Option<&str>, rate: f32, _pitch: f32) -> Result<()> {
        self.spoken.lock().unwrap().push((text.to_string(), rate));
        Ok(())
    }

    async fn stop(&self) {}
}

/// Audio session that records activate/deactivate calls
#[derive(Default)]
struct RecordingSession {
    events: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl AudioSession for RecordingSession {
    async fn activate(&self) -> Result<()> {
        self.events.lock().unwrap().push("activate");
        Ok(())
    }

    async fn deactivate(&self) {
        self.events.lock().unwrap().push("deactivate");
    }
}

/// Session that never complains, for tests that don't care
struct QuietSession;

#[async_trait]
impl AudioSession for QuietSession {
    async fn activate(&self) -> Result<()> {
        Ok(())
    }

    async fn deactivate(&self) {}
}

const SENTENCE_A: &str = "This first sentence contains more than five words total.";
const SENTENCE_B: &str = "This second sentence also contains more than five words.";

#[tokio::test]
async fn utterances_speak_in_finalization_order() {
    let neural = Arc::new(RecordingNeural::default());
    let played = Arc::clone(&neural.played);
    let system = Arc::new(RecordingSystem::default());
    let fallback_spoken = Arc::clone(&system.spoken);

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        neural,
        system,
        preferences(EnginePreference::Neural, 1.0),
        Arc::new(QuietSession),
    );

    pipeline.push(SENTENCE_A);
    pipeline.push(" ");
    pipeline.push(SENTENCE_B);
    pipeline.flush();
    pipeline.wait_until_idle().await;

    assert_eq!(
        *played.lock().unwrap(),
        vec![SENTENCE_A.to_string(), SENTENCE_B.to_string()]
    );
    assert!(fallback_spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prefetch_generates_each_utterance_once() {
    let neural = Arc::new(RecordingNeural::default());
    let generated = Arc::clone(&neural.generated);
    let played = Arc::clone(&neural.played);

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        neural,
        Arc::new(RecordingSystem::default()),
        preferences(EnginePreference::Neural, 1.0),
        Arc::new(QuietSession),
    );

    pipeline.push(SENTENCE_A);
    pipeline.push(" ");
    pipeline.push(SENTENCE_B);
    pipeline.flush();
    pipeline.wait_until_idle().await;

    // The second utterance is prefetched while the first plays and its
    // cached audio is consumed, so nothing is generated twice
    assert_eq!(played.lock().unwrap().len(), 2);
    assert_eq!(generated.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn broken_neural_falls_back_per_utterance() {
    let system = Arc::new(RecordingSystem::default());
    let spoken = Arc::clone(&system.spoken);

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        Arc::new(BrokenNeural),
        system,
        preferences(EnginePreference::Neural, 1.0),
        Arc::new(QuietSession),
    );

    pipeline.push(SENTENCE_A);
    pipeline.push(" ");
    pipeline.push(SENTENCE_B);
    pipeline.flush();
    pipeline.wait_until_idle().await;

    // One utterance failing on the primary engine never drops the next
    let spoken = spoken.lock().unwrap();
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[0].0, SENTENCE_A);
    assert_eq!(spoken[1].0, SENTENCE_B);
}

#[tokio::test]
async fn unavailable_neural_routes_to_system_engine() {
    let system = Arc::new(RecordingSystem::default());
    let spoken = Arc::clone(&system.spoken);

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        Arc::new(UnavailableNeural),
        system,
        preferences(EnginePreference::Neural, 1.0),
        Arc::new(QuietSession),
    );

    pipeline.push("Yes.");
    pipeline.flush();
    pipeline.wait_until_idle().await;

    assert_eq!(spoken.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn stop_mid_generation_resets_for_a_clean_turn() {
    let entered = Arc::new(Notify::new());
    let played = Arc::new(Mutex::new(Vec::new()));
    let neural = Arc::new(StallOnceNeural::new(Arc::clone(&entered), Arc::clone(&played)));

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        neural,
        Arc::new(RecordingSystem::default()),
        preferences(EnginePreference::Neural, 1.0),
        Arc::new(QuietSession),
    );

    pipeline.push(SENTENCE_A);
    pipeline.flush();

    // Generation is now parked inside the engine
    entered.notified().await;
    pipeline.stop();
    pipeline.wait_until_idle().await;

    assert!(pipeline.is_idle());
    assert_eq!(pipeline.queued(), 0);
    assert!(played.lock().unwrap().is_empty());

    // A fresh turn works normally
    pipeline.push(SENTENCE_B);
    pipeline.flush();
    pipeline.wait_until_idle().await;
    assert_eq!(*played.lock().unwrap(), vec![SENTENCE_B.to_string()]);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        Arc::new(UnavailableNeural),
        Arc::new(RecordingSystem::default()),
        preferences(EnginePreference::Neural, 1.0),
        Arc::new(QuietSession),
    );

    pipeline.stop();
    pipeline.stop();
    pipeline.wait_until_idle().await;
    assert!(pipeline.is_idle());

    pipeline.push("Still works.");
    pipeline.flush();
    pipeline.wait_until_idle().await;
    assert!(pipeline.is_idle());
}

#[tokio::test]
async fn pacing_never_speeds_up_under_queue_pressure() {
    let system = Arc::new(RecordingSystem::default());
    let spoken = Arc::clone(&system.spoken);

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        Arc::new(UnavailableNeural),
        system,
        preferences(EnginePreference::System, 1.5),
        Arc::new(QuietSession),
    );

    // Flood the queue far faster than it can drain
    for _ in 0..20 {
        pipeline.push(SENTENCE_A);
        pipeline.push(" ");
    }
    pipeline.flush();
    pipeline.wait_until_idle().await;

    let spoken = spoken.lock().unwrap();
    assert_eq!(spoken.len(), 20);
    // The configured rate is applied uniformly regardless of queue depth
    assert!(spoken.iter().all(|(_, rate)| (*rate - 1.5).abs() < f32::EPSILON));
}

#[tokio::test]
async fn audio_session_wraps_the_turn() {
    let session = Arc::new(RecordingSession::default());
    let events = Arc::clone(&session.events);

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        Arc::new(UnavailableNeural),
        Arc::new(RecordingSystem::default()),
        preferences(EnginePreference::Neural, 1.0),
        session,
    );

    pipeline.push("Yes.");
    pipeline.flush();
    pipeline.wait_until_idle().await;
    assert_eq!(*events.lock().unwrap(), vec!["activate"]);

    // Stop releases the session without waiting out the idle grace period
    pipeline.stop();
    pipeline.wait_until_idle().await;
    assert_eq!(*events.lock().unwrap(), vec!["activate", "deactivate"]);
}

#[tokio::test]
async fn streamed_chunks_reassemble_in_spoken_output() {
    let system = Arc::new(RecordingSystem::default());
    let spoken = Arc::clone(&system.spoken);

    let pipeline = SpeechPipeline::spawn(
        SegmentationConfig::default(),
        Arc::new(UnavailableNeural),
        system,
        preferences(EnginePreference::System, 1.0),
        Arc::new(QuietSession),
    );

    let text = "The reply streams in, a handful of characters at a time. \
                Every word must come out the far end, in order, with the \
                code stripped. ```let x = 5;``` Nothing else is lost.";
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(7) {
        pipeline.push(&chunk.iter().collect::<String>());
    }
    pipeline.flush();
    pipeline.wait_until_idle().await;

    let spoken = spoken.lock().unwrap();
    let rejoined: Vec<String> = spoken
        .iter()
        .flat_map(|(text, _)| text.split_whitespace().map(String::from))
        .collect();
    let expected: Vec<String> = text
        .replace("```let x = 5;```", " ")
        .split_whitespace()
        .map(String::from)
        .collect();
    assert_eq!(rejoined, expected);
}
