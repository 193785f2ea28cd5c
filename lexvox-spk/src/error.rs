//! Error types for lexvox-spk

use thiserror::Error;

/// Speech backend and configuration errors
///
/// The narration engine never returns these from its playback operations;
/// they surface at the backend seam and when loading configuration.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SpeechError {
    fn from(err: toml::de::Error) -> Self {
        SpeechError::Config(format!("Invalid TOML: {}", err))
    }
}
