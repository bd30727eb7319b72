use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults;
use crate::error::{Result, VoxloopError};

/// Remote synthesis voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::Alloy
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Voice {
    type Err = VoxloopError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alloy" => Ok(Self::Alloy),
            "echo" => Ok(Self::Echo),
            "fable" => Ok(Self::Fable),
            "onyx" => Ok(Self::Onyx),
            "nova" => Ok(Self::Nova),
            "shimmer" => Ok(Self::Shimmer),
            other => Err(VoxloopError::ConfigInvalidValue {
                key: "tts.voice".to_string(),
                message: format!("unknown voice: {}", other),
            }),
        }
    }
}

/// Validate a playback speed multiplier against the accepted range.
pub fn validate_speed(speed: f32) -> Result<f32> {
    if (defaults::MIN_SPEED..=defaults::MAX_SPEED).contains(&speed) {
        Ok(speed)
    } else {
        Err(VoxloopError::ConfigInvalidValue {
            key: "tts.speed".to_string(),
            message: format!(
                "must be between {} and {}, got {}",
                defaults::MIN_SPEED,
                defaults::MAX_SPEED,
                speed
            ),
        })
    }
}

/// Error from one synthesis attempt.
///
/// Retryable failures (429, 5xx, timeout) are worth another attempt against
/// the same tier; fatal ones send the chain straight to the next tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("retryable synthesis failure: {message}")]
    Retryable { message: String },

    #[error("synthesis failure: {message}")]
    Fatal { message: String },
}

impl AttemptError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

/// Trait for one synthesis tier.
///
/// Returns encoded audio bytes; the caller owns retry policy, cost
/// accounting, and playback.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, AttemptError>;

    /// Name of the backing engine, for session summaries.
    fn provider_name(&self) -> &str;
}

/// Mock synthesizer for testing.
///
/// Plays a scripted sequence of per-call outcomes, then repeats the last
/// configured behavior (success with the default payload when unscripted).
pub struct MockSynthesizer {
    provider: String,
    script: Mutex<VecDeque<std::result::Result<Vec<u8>, AttemptError>>>,
    calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a successful attempt returning the given bytes.
    pub fn then_audio(self, audio: &[u8]) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(audio.to_vec()));
        }
        self
    }

    /// Queue a retryable failure.
    pub fn then_retryable(self, message: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(AttemptError::Retryable {
                message: message.to_string(),
            }));
        }
        self
    }

    /// Queue a fatal failure.
    pub fn then_fatal(self, message: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(AttemptError::Fatal {
                message: message.to_string(),
            }));
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Synthesizer for MockSynthesizer {
    fn synthesize(&self, _text: &str) -> std::result::Result<Vec<u8>, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock() {
            Ok(mut script) => script
                .pop_front()
                .unwrap_or_else(|| Ok(b"mock audio".to_vec())),
            Err(_) => Ok(b"mock audio".to_vec()),
        }
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }
}
