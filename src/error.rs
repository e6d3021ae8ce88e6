//! Error types for PetalVoice

use thiserror::Error;

/// Errors reported by setup paths (context creation, configuration, decoding).
///
/// Runtime playback operations never return these: pool exhaustion, decoder
/// underrun and out-of-range parameters are handled by dropping the request.
#[derive(Error, Debug)]
pub enum PetalVoiceError {
    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, PetalVoiceError>;
