//! Speech engine and audio collaborator interfaces
//!
//! The pipeline depends on these traits, never on concrete engines, so the
//! segmentation and scheduling logic is testable in isolation. One shared
//! instance of each collaborator is constructed at process start and
//! injected.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::{EnginePreference, VoiceConfig};
use crate::{Error, Result};

/// A block of synthesized audio, opaque to the pipeline
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    /// Encoded audio bytes in whatever format the engine produces
    pub bytes: Vec<u8>,
}

/// High-quality engine with offline synthesis.
///
/// Generation is separate from playback, which is what makes prefetch
/// possible: the pipeline generates the next utterance while the current
/// one plays.
#[async_trait]
pub trait NeuralEngine: Send + Sync {
    /// Whether the engine can synthesize right now (model downloaded,
    /// initialized)
    fn is_ready(&self) -> bool;

    /// Synthesize a whole utterance
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn generate(&self, text: &str, speed: f32) -> Result<AudioClip>;

    /// Synthesize an utterance as a sequence of chunks, for long text where
    /// time-to-first-sound matters
    ///
    /// # Errors
    ///
    /// Returns error if synthesis cannot start
    async fn generate_streaming(
        &self,
        text: &str,
        speed: f32,
    ) -> Result<BoxStream<'static, Result<AudioClip>>>;

    /// Play a previously generated clip to completion
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    async fn play(&self, clip: AudioClip) -> Result<()>;

    /// Stop any in-flight generation or playback
    async fn stop(&self);
}

/// Built-in low-latency fallback engine; speaks synchronously
#[async_trait]
pub trait SystemEngine: Send + Sync {
    /// Speak text to completion
    ///
    /// # Errors
    ///
    /// Returns error if speaking fails
    async fn speak(&self, text: &str, voice: Option<&str>, rate: f32, pitch: f32) -> Result<()>;

    /// Stop speaking
    async fn stop(&self);
}

/// Read-only source of the current engine/voice selection
pub trait VoicePreferences: Send + Sync {
    /// Preferred engine
    fn engine(&self) -> EnginePreference;

    /// Speech rate multiplier
    fn rate(&self) -> f32;

    /// Voice identifier for the built-in engine
    fn voice(&self) -> Option<String>;

    /// Pitch multiplier for the built-in engine
    fn pitch(&self) -> f32;
}

/// Process-wide audio output session.
///
/// Only the pipeline activates and deactivates it, around each turn.
#[async_trait]
pub trait AudioSession: Send + Sync {
    /// Claim the audio output for playback
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be activated
    async fn activate(&self) -> Result<()>;

    /// Release the audio output
    async fn deactivate(&self);
}

/// Fixed preferences captured from a [`VoiceConfig`]
#[derive(Debug, Clone)]
pub struct StaticPreferences {
    config: VoiceConfig,
}

impl StaticPreferences {
    /// Wrap a voice config as a preference source
    #[must_use]
    pub const fn new(config: VoiceConfig) -> Self {
        Self { config }
    }
}

impl VoicePreferences for StaticPreferences {
    fn engine(&self) -> EnginePreference {
        self.config.engine
    }

    fn rate(&self) -> f32 {
        self.config.rate
    }

    fn voice(&self) -> Option<String> {
        self.config.voice.clone()
    }

    fn pitch(&self) -> f32 {
        self.config.pitch
    }
}

/// Placeholder neural engine for setups where no model is installed.
///
/// Never ready; every call reports [`Error::EngineUnavailable`], which
/// routes each utterance to the fallback engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableNeural;

#[async_trait]
impl NeuralEngine for UnavailableNeural {
    fn is_ready(&self) -> bool {
        false
    }

    async fn generate(&self, _text: &str, _speed: f32) -> Result<AudioClip> {
        Err(Error::EngineUnavailable("no neural model installed".to_string()))
    }

    async fn generate_streaming(
        &self,
        _text: &str,
        _speed: f32,
    ) -> Result<BoxStream<'static, Result<AudioClip>>> {
        Err(Error::EngineUnavailable("no neural model installed".to_string()))
    }

    async fn play(&self, _clip: AudioClip) -> Result<()> {
        Err(Error::EngineUnavailable("no neural model installed".to_string()))
    }

    async fn stop(&self) {}
}

/// Milliseconds of simulated speech per character at rate 1.0
const CONSOLE_MS_PER_CHAR: f64 = 30.0;

/// Console "engine" for headless use: logs each utterance and sleeps for a
/// duration proportional to its length and the speech rate
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEngine;

#[async_trait]
impl SystemEngine for ConsoleEngine {
    async fn speak(&self, text: &str, voice: Option<&str>, rate: f32, pitch: f32) -> Result<()> {
        let chars = text.chars().count();
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let millis = (chars as f64 * CONSOLE_MS_PER_CHAR / f64::from(rate.max(0.25))) as u64;

        tracing::info!(voice = voice.unwrap_or("default"), rate, pitch, "speaking");
        println!("{text}");
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }

    async fn stop(&self) {}
}

/// No-op audio session for headless or test use
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioSession;

#[async_trait]
impl AudioSession for NullAudioSession {
    async fn activate(&self) -> Result<()> {
        tracing::debug!("audio session activated");
        Ok(())
    }

    async fn deactivate(&self) {
        tracing::debug!("audio session deactivated");
    }
}
