//! Coarse affect classification.
//!
//! A keyword heuristic over the transcript, attached to user messages and
//! sent as context with full-mode dialogue requests. Deliberately shallow:
//! the remote service does the real interpretation, this label only biases
//! it.

use serde::{Deserialize, Serialize};

/// Coarse affect label for a user utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affect {
    Calm,
    Anxious,
    Sad,
    Angry,
    Bright,
}

impl std::fmt::Display for Affect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Calm => "calm",
            Self::Anxious => "anxious",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Bright => "bright",
        };
        write!(f, "{name}")
    }
}

const ANXIOUS_MARKERS: &[&str] = &[
    "worried", "anxious", "nervous", "scared", "afraid", "stress", "panic", "overwhelm",
];

const SAD_MARKERS: &[&str] = &[
    "sad", "lonely", "depressed", "miss", "cry", "grief", "hopeless", "tired of",
];

const ANGRY_MARKERS: &[&str] = &[
    "angry", "furious", "hate", "annoyed", "frustrat", "unfair", "sick of",
];

const BRIGHT_MARKERS: &[&str] = &[
    "happy", "great", "excited", "wonderful", "love", "amazing", "glad", "proud",
];

/// Classify a transcript into a coarse affect label.
///
/// First matching category wins, checked in order of urgency (anxious, sad,
/// angry, bright); anything unmatched reads as calm.
pub fn classify_affect(text: &str) -> Affect {
    let lower = text.to_lowercase();

    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(ANXIOUS_MARKERS) {
        Affect::Anxious
    } else if contains_any(SAD_MARKERS) {
        Affect::Sad
    } else if contains_any(ANGRY_MARKERS) {
        Affect::Angry
    } else if contains_any(BRIGHT_MARKERS) {
        Affect::Bright
    } else {
        Affect::Calm
    }
}
