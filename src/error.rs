//! Error types for the Banter gateway

use thiserror::Error;

/// Result type alias for Banter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Banter gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or incomplete request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Persona outside the known set
    #[error("unknown persona: {0}")]
    InvalidPersona(String),

    /// Audio normalization failed
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Transcription provider reported a failed job
    #[error("transcription provider error: {0}")]
    TranscriptionProvider(String),

    /// Transcription request failed at the network or HTTP level
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Transcript did not reach a terminal status within the poll bound
    #[error("transcription timed out after {attempts} polls")]
    TranscriptionTimeout {
        /// Number of poll requests made before giving up
        attempts: u32,
    },

    /// Chat completion provider error
    #[error("chat provider error: {0}")]
    ChatProvider(String),

    /// Speech synthesis provider error
    #[error("synthesis provider error: {0}")]
    SynthesisProvider(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
