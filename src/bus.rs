//! Ordered in-process event bus.
//!
//! Every observable state change in a session is published here as a
//! [`SessionEvent`]. Handlers run synchronously in subscription order under a
//! single lock, so the event order every observer sees is the order of
//! `publish` calls. Nothing is coalesced or dropped.
//!
//! Out-of-process observers (UIs, logs) attach a channel tap instead of a
//! closure; taps receive the same ordered stream without running code inside
//! the publish lock.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::dialogue::DialogueMode;
use crate::error::ErrorStage;

/// Which accounting bucket a cost delta belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostStage {
    Transcription,
    Dialogue,
    Synthesis,
}

/// One event on the session bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Milliseconds since the Unix epoch at publish time.
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Payload of a session event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// Recording of a user turn began.
    MicStart,
    /// Recording of a user turn ended.
    MicStop,
    /// Periodic amplitude reading while capturing.
    AudioLevel { amplitude: f32, is_speech: bool },
    /// A user utterance was transcribed (or a partial buffer flushed on stop).
    TranscriptComplete { text: String },
    /// Dialogue turn processing began.
    ProcessingStart { mode: DialogueMode },
    /// Dialogue turn processing produced a response.
    ProcessingComplete { response: String },
    /// Speech synthesis began for the given text.
    TtsStart { text: String },
    /// The primary synthesis tier was abandoned for the local fallback.
    TtsFallback { reason: String },
    /// Response playback began.
    AudioStart,
    /// Response playback ran to completion. An interrupted playback ends
    /// with the `interrupt` event instead and publishes no `audio_end`.
    AudioEnd,
    /// Accumulated cost changed.
    CostUpdate {
        stage: CostStage,
        delta: f64,
        total: f64,
    },
    /// A pipeline stage failed; the session keeps running.
    Error { stage: ErrorStage, message: String },
    /// Playback was interrupted by the user.
    Interrupt,
    /// The session opened.
    ConnectionOpen,
    /// The session closed.
    ConnectionClose,
}

impl EventKind {
    /// Stable snake_case name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MicStart => "mic_start",
            Self::MicStop => "mic_stop",
            Self::AudioLevel { .. } => "audio_level",
            Self::TranscriptComplete { .. } => "transcript_complete",
            Self::ProcessingStart { .. } => "processing_start",
            Self::ProcessingComplete { .. } => "processing_complete",
            Self::TtsStart { .. } => "tts_start",
            Self::TtsFallback { .. } => "tts_fallback",
            Self::AudioStart => "audio_start",
            Self::AudioEnd => "audio_end",
            Self::CostUpdate { .. } => "cost_update",
            Self::Error { .. } => "error",
            Self::Interrupt => "interrupt",
            Self::ConnectionOpen => "connection_open",
            Self::ConnectionClose => "connection_close",
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

type Handler = Box<dyn Fn(&SessionEvent) + Send>;

struct BusInner {
    handlers: Vec<Handler>,
    taps: Vec<Sender<SessionEvent>>,
}

/// Ordered publish/subscribe hub for one session.
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                handlers: Vec::new(),
                taps: Vec::new(),
            }),
        }
    }

    /// Register a handler. Handlers fire synchronously inside `publish`, in
    /// the order they were registered.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&SessionEvent) + Send + 'static,
    {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.handlers.push(Box::new(handler));
    }

    /// Attach a channel tap receiving every event after the closure handlers.
    ///
    /// Dropping the receiver detaches the tap; the bus prunes dead taps on
    /// the next publish.
    pub fn tap(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.taps.push(tx);
        rx
    }

    /// Publish an event, stamping it with the current wall-clock time.
    pub fn publish(&self, kind: EventKind) {
        self.publish_at(now_ms(), kind);
    }

    /// Publish with an explicit timestamp.
    pub fn publish_at(&self, timestamp_ms: u64, kind: EventKind) {
        let event = SessionEvent { timestamp_ms, kind };
        tracing::trace!(event = event.kind.name(), "bus publish");
        // Holding the lock for the whole dispatch is what guarantees a single
        // total order across publishing threads. A handler that panicked on
        // an earlier event poisons the lock; recover it so later events still
        // reach every subscriber.
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for handler in &inner.handlers {
            handler(&event);
        }
        inner.taps.retain(|tap| tap.send(event.clone()).is_ok());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
