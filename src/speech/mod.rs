//! Incremental speech processing
//!
//! Turns a streamed text response into spoken utterances: code fences are
//! filtered out, boundaries are found heuristically, short clauses are
//! merged, technical substrings are normalized for speech, and a two-slot
//! pipeline overlaps audio generation with playback.

pub mod boundary;
pub mod buffer;
pub mod engine;
pub mod fence;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod segmenter;

pub use boundary::BoundaryExtractor;
pub use buffer::AccumulationBuffer;
pub use engine::{
    AudioClip, AudioSession, ConsoleEngine, NeuralEngine, NullAudioSession, StaticPreferences,
    SystemEngine, UnavailableNeural, VoicePreferences,
};
pub use fence::{CodeFenceFilter, FenceEvent};
pub use merge::ClauseMerger;
pub use normalize::normalize;
pub use pipeline::{PlaybackState, SpeechPipeline};
pub use segmenter::StreamSegmenter;
