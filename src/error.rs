//! Error types for the sotto speech pipeline

use thiserror::Error;

/// Result type alias for sotto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the speech pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Primary engine is not ready (model not downloaded, not initialized)
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Synthesis failed in the engine
    #[error("generation error: {0}")]
    Generation(String),

    /// Audio output/session error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
