//! Session state container.
//!
//! All mutation happens in [`SessionState::apply`], registered as the first
//! bus subscriber, so the event stream is the single writer and every other
//! observer sees state that matches the events it received.

use serde::{Deserialize, Serialize};

use crate::bus::{CostStage, EventKind, SessionEvent};
use crate::dialogue::{DialogueMode, Message, classify_affect};

/// Accumulated dollar cost per stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub transcription: f64,
    pub dialogue: f64,
    pub synthesis: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.transcription + self.dialogue + self.synthesis
    }
}

/// One labelled timestamp in the turn pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSample {
    pub label: String,
    pub timestamp_ms: u64,
}

/// Mutable state of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub mode: DialogueMode,
    pub is_listening: bool,
    pub is_processing: bool,
    pub is_speaking: bool,
    pub history: Vec<Message>,
    pub timings: Vec<TimingSample>,
    pub cost: CostBreakdown,
    pub last_error: Option<String>,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
}

impl SessionState {
    pub fn new(mode: DialogueMode) -> Self {
        Self {
            mode,
            is_listening: false,
            is_processing: false,
            is_speaking: false,
            history: Vec::new(),
            timings: Vec::new(),
            cost: CostBreakdown::default(),
            last_error: None,
            started_at_ms: None,
            ended_at_ms: None,
        }
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &SessionEvent) {
        let ts = event.timestamp_ms;
        match &event.kind {
            EventKind::MicStart => {
                // Listening and speaking are mutually exclusive.
                self.is_speaking = false;
                self.is_listening = true;
                self.note_timing("mic_start", ts);
            }
            EventKind::MicStop => {
                self.is_listening = false;
                self.note_timing("mic_stop", ts);
            }
            EventKind::AudioLevel { .. } => {}
            EventKind::TranscriptComplete { text } => {
                self.note_timing("transcript_complete", ts);
                if !text.is_empty() {
                    let affect = match self.mode {
                        DialogueMode::Full => Some(classify_affect(text)),
                        _ => None,
                    };
                    self.history.push(Message::user(text, ts, affect));
                }
            }
            EventKind::ProcessingStart { .. } => {
                self.is_processing = true;
                self.note_timing("processing_start", ts);
            }
            EventKind::ProcessingComplete { response } => {
                self.is_processing = false;
                self.note_timing("processing_complete", ts);
                if !response.is_empty() {
                    self.history.push(Message::assistant(response, ts));
                }
            }
            EventKind::TtsStart { .. } => {
                self.note_timing("tts_start", ts);
            }
            EventKind::TtsFallback { .. } => {
                self.note_timing("tts_fallback", ts);
            }
            EventKind::AudioStart => {
                self.is_listening = false;
                self.is_speaking = true;
                self.note_timing("audio_start", ts);
            }
            EventKind::AudioEnd => {
                self.is_speaking = false;
                self.note_timing("audio_end", ts);
            }
            EventKind::CostUpdate { stage, delta, .. } => match stage {
                CostStage::Transcription => self.cost.transcription += delta,
                CostStage::Dialogue => self.cost.dialogue += delta,
                CostStage::Synthesis => self.cost.synthesis += delta,
            },
            EventKind::Error { stage, message } => {
                self.last_error = Some(format!("{}: {}", stage, message));
            }
            EventKind::Interrupt => {
                self.is_speaking = false;
                self.note_timing("interrupt", ts);
            }
            EventKind::ConnectionOpen => {
                self.started_at_ms = Some(ts);
            }
            EventKind::ConnectionClose => {
                self.ended_at_ms = Some(ts);
            }
        }
        debug_assert!(
            !(self.is_listening && self.is_speaking),
            "listening and speaking at once"
        );
    }

    fn note_timing(&mut self, label: &str, timestamp_ms: u64) {
        self.timings.push(TimingSample {
            label: label.to_string(),
            timestamp_ms,
        });
    }

    /// Perceived wait per turn: mic_stop to the next audio_start.
    pub fn latency_samples_ms(&self) -> Vec<u64> {
        let mut samples = Vec::new();
        let mut pending_stop: Option<u64> = None;
        for timing in &self.timings {
            match timing.label.as_str() {
                "mic_stop" => pending_stop = Some(timing.timestamp_ms),
                "audio_start" => {
                    if let Some(stop) = pending_stop.take() {
                        samples.push(timing.timestamp_ms.saturating_sub(stop));
                    }
                }
                _ => {}
            }
        }
        samples
    }
}
