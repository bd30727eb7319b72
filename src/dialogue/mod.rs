//! Dialogue turn processing: modes, affect, remote client, history.

pub mod affect;
pub mod client;
pub mod processor;
pub mod random;

pub use affect::{Affect, classify_affect};
pub use client::{DialogueClient, HttpDialogueClient, MockDialogueClient, TurnContext};
pub use processor::{Turn, TurnProcessor};
pub use random::{FixedRandom, RandomSource, SystemRandom};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How much the session talks back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueMode {
    /// Transcription only; no response is produced.
    Scribe,
    /// A short canned acknowledgment after each turn; no network call.
    Active,
    /// Full response generated by the remote dialogue service.
    Full,
}

impl Default for DialogueMode {
    fn default() -> Self {
        Self::Full
    }
}

impl std::fmt::Display for DialogueMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scribe => "scribe",
            Self::Active => "active",
            Self::Full => "full",
        };
        write!(f, "{name}")
    }
}

impl FromStr for DialogueMode {
    type Err = crate::error::VoxloopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scribe" => Ok(Self::Scribe),
            "active" => Ok(Self::Active),
            "full" => Ok(Self::Full),
            other => Err(crate::error::VoxloopError::ConfigInvalidValue {
                key: "mode".to_string(),
                message: format!("unknown mode: {}", other),
            }),
        }
    }
}

/// Who said a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp_ms: u64,
    /// Affect label attached to user messages in full mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affect: Option<Affect>,
}

impl Message {
    pub fn user(text: &str, timestamp_ms: u64, affect: Option<Affect>) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
            timestamp_ms,
            affect,
        }
    }

    pub fn assistant(text: &str, timestamp_ms: u64) -> Self {
        Self {
            role: Role::Assistant,
            text: text.to_string(),
            timestamp_ms,
            affect: None,
        }
    }
}
