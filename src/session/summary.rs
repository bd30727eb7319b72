//! End-of-session summary.

use serde::{Deserialize, Serialize};

use crate::dialogue::Message;
use crate::session::state::{CostBreakdown, SessionState};

/// Backend names used for each stage of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Providers {
    pub transcription: String,
    pub dialogue: String,
    pub synthesis: String,
}

/// Everything the host needs after a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub providers: Providers,
    pub cost: CostBreakdown,
    pub total_cost: f64,
    /// Perceived wait per turn (mic_stop to audio_start), milliseconds.
    pub latency_samples_ms: Vec<u64>,
    pub transcript: Vec<Message>,
}

impl SessionSummary {
    pub fn from_state(session_id: &str, providers: Providers, state: &SessionState) -> Self {
        Self {
            session_id: session_id.to_string(),
            started_at_ms: state.started_at_ms.unwrap_or(0),
            ended_at_ms: state.ended_at_ms.unwrap_or(0),
            providers,
            cost: state.cost,
            total_cost: state.cost.total(),
            latency_samples_ms: state.latency_samples_ms(),
            transcript: state.history.clone(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.ended_at_ms.saturating_sub(self.started_at_ms)
    }

    pub fn message_count(&self) -> usize {
        self.transcript.len()
    }

    pub fn average_latency_ms(&self) -> Option<u64> {
        if self.latency_samples_ms.is_empty() {
            return None;
        }
        let sum: u64 = self.latency_samples_ms.iter().sum();
        Some(sum / self.latency_samples_ms.len() as u64)
    }
}
