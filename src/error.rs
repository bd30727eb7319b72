//! Error types for voxloop.

use thiserror::Error;

/// How a transcription attempt failed.
///
/// Transcription is a single attempt per utterance; each outcome routes
/// differently in the session loop, so the distinction is part of the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionFailure {
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The service answered with a non-success status.
    Service { status: u16, message: String },
    /// The service answered successfully but produced no text.
    EmptyResult,
}

impl std::fmt::Display for TranscriptionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Service { status, message } => {
                write!(f, "service returned {status}: {message}")
            }
            Self::EmptyResult => write!(f, "empty result"),
        }
    }
}

/// Pipeline stage an error event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Capture,
    Transcription,
    Dialogue,
    Synthesis,
    Playback,
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Capture => "capture",
            Self::Transcription => "transcription",
            Self::Dialogue => "dialogue",
            Self::Synthesis => "synthesis",
            Self::Playback => "playback",
        };
        write!(f, "{name}")
    }
}

#[derive(Error, Debug)]
pub enum VoxloopError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio errors
    #[error("Audio device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    // Transcription errors
    #[error("Transcription failed: {failure}")]
    Transcription { failure: TranscriptionFailure },

    // Dialogue errors
    #[error("Dialogue service returned {status}: {message}")]
    Dialogue { status: u16, message: String },

    // Synthesis errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Session lifecycle errors
    #[error("Invalid session transition: {message}")]
    InvalidTransition { message: String },

    #[error("Turn was interrupted")]
    Interrupted,

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl VoxloopError {
    /// Map this error to the pipeline stage it belongs to, if any.
    pub fn stage(&self) -> Option<ErrorStage> {
        match self {
            Self::DeviceUnavailable { .. } => Some(ErrorStage::Capture),
            Self::Transcription { .. } => Some(ErrorStage::Transcription),
            Self::Dialogue { .. } => Some(ErrorStage::Dialogue),
            Self::Synthesis { .. } => Some(ErrorStage::Synthesis),
            Self::Playback { .. } => Some(ErrorStage::Playback),
            _ => None,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxloopError>;
