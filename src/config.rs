//! Configuration for the speech pipeline
//!
//! All segmentation thresholds are tunable. The defaults are the
//! prefetch-aware set: longer segments are acceptable because the pipeline
//! hides synthesis latency by generating the next utterance while the
//! current one plays.

use std::path::Path;

use serde::Deserialize;

use crate::{Error, Result};

/// Which synthesis engine to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// High-quality neural engine with offline generation and prefetch
    #[default]
    Neural,
    /// Built-in low-latency engine that speaks synchronously
    System,
}

/// Segmentation thresholds, all measured in whitespace-delimited words
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Below this word count, only a sentence-ending boundary may cut
    pub min_segment_words: usize,

    /// Forced cuts break at this word count
    pub soft_max_words: usize,

    /// A buffer reaching this word count with no punctuation forces a cut
    pub hard_max_words: usize,

    /// A clause cut must yield a segment of at least this many words
    pub min_words_before_clause_break: usize,

    /// A clause cut must not leave a non-empty remainder shorter than this
    pub min_orphan_words: usize,

    /// Segments at or below this word count are held for merging
    pub short_clause_words: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_segment_words: 8,
            soft_max_words: 30,
            hard_max_words: 45,
            min_words_before_clause_break: 12,
            min_orphan_words: 4,
            short_clause_words: 5,
        }
    }
}

/// Voice and engine selection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Preferred synthesis engine
    pub engine: EnginePreference,

    /// Speech rate multiplier (1.0 = normal). Applied uniformly; the
    /// pipeline never speeds up to drain a deep queue.
    pub rate: f32,

    /// Voice identifier for the built-in engine, if any
    pub voice: Option<String>,

    /// Pitch multiplier for the built-in engine (1.0 = normal)
    pub pitch: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            engine: EnginePreference::Neural,
            rate: 1.0,
            voice: None,
            pitch: 1.0,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Segmentation thresholds
    pub segmentation: SegmentationConfig,

    /// Voice and engine selection
    pub voice: VoiceConfig,
}

impl SpeechConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate threshold relationships
    ///
    /// # Errors
    ///
    /// Returns error if thresholds are inconsistent
    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmentation;
        if seg.soft_max_words == 0 || seg.hard_max_words < seg.soft_max_words {
            return Err(Error::Config(format!(
                "hard_max_words ({}) must be >= soft_max_words ({}) and both non-zero",
                seg.hard_max_words, seg.soft_max_words
            )));
        }
        if seg.min_segment_words > seg.soft_max_words {
            return Err(Error::Config(format!(
                "min_segment_words ({}) must not exceed soft_max_words ({})",
                seg.min_segment_words, seg.soft_max_words
            )));
        }
        if !(0.25..=4.0).contains(&self.voice.rate) {
            return Err(Error::Config(format!(
                "rate {} out of range (0.25..=4.0)",
                self.voice.rate
            )));
        }
        Ok(())
    }
}
