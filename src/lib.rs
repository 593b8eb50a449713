//! Sotto - incremental text-to-speech segmentation and playback
//!
//! Sotto consumes an unbounded, incrementally-arriving text stream (tokens
//! from a live AI response) and decides, in real time, where to cut that
//! stream into spoken utterances, how to normalize each utterance for
//! natural speech, and how to overlap utterance generation with playback so
//! audio never stalls while the next utterance is being synthesized.
//!
//! # Architecture
//!
//! ```text
//! text chunks ──► Code-Fence Filter ──► Accumulation Buffer
//!                                             │
//!                                     Boundary Extractor (drain loop)
//!                                             │
//!                                       Clause Merger ──► Segment Queue
//!                                                              │
//!                              ┌───────────────────────────────┘
//!                              ▼
//!                    Playback/Generation Pipeline
//!                    (normalize → generate ∥ play)
//!                              │
//!                      Speech Engine (neural, with
//!                      built-in fallback)
//! ```
//!
//! Speech engines, audio routing, and preference storage are external
//! collaborators behind the traits in [`speech::engine`].

pub mod config;
pub mod error;
pub mod speech;

pub use config::{EnginePreference, SegmentationConfig, SpeechConfig, VoiceConfig};
pub use error::{Error, Result};
pub use speech::{
    AudioClip, AudioSession, NeuralEngine, PlaybackState, SpeechPipeline, StreamSegmenter,
    SystemEngine, VoicePreferences,
};
