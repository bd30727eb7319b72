//! Turn segmentation.
//!
//! Decides when a user has finished speaking: a recording ends once no
//! speech-bearing chunk has arrived for the configured silence threshold.
//! The check runs on the capture loop's poll cadence (100ms), so a turn ends
//! within one poll interval of the threshold being crossed.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::defaults;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic timing tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Instant>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advances the mock clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += duration;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current
            .lock()
            .map(|current| *current)
            .unwrap_or_else(|_| Instant::now())
    }
}

/// Configuration for turn segmentation.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Silence duration that ends a turn, in milliseconds.
    pub silence_threshold_ms: u64,
    /// Cadence of silence checks, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: defaults::SILENCE_THRESHOLD_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

/// Silence-based end-of-turn detector.
///
/// While a recording is active, `note_level` is called for every captured
/// chunk and `should_end_turn` on every poll tick. The speech timestamp
/// starts at `begin_turn`, so a turn with no speech at all still ends after
/// the threshold.
pub struct TurnSegmenter<C: Clock = SystemClock> {
    config: SegmenterConfig,
    clock: C,
    last_speech: Option<Instant>,
}

impl TurnSegmenter<SystemClock> {
    pub fn new(config: SegmenterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> TurnSegmenter<C> {
    pub fn with_clock(config: SegmenterConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            last_speech: None,
        }
    }

    /// Whether a turn is currently being tracked.
    pub fn is_active(&self) -> bool {
        self.last_speech.is_some()
    }

    /// Start tracking a turn. The silence timer runs from this moment.
    pub fn begin_turn(&mut self) {
        self.last_speech = Some(self.clock.now());
    }

    /// Record the speech classification of one captured chunk.
    ///
    /// Only speech-bearing chunks reset the silence timer; silent chunks
    /// (and empty reads) let it run.
    pub fn note_level(&mut self, is_speech: bool) {
        if is_speech && self.last_speech.is_some() {
            self.last_speech = Some(self.clock.now());
        }
    }

    /// Milliseconds since the last speech-bearing chunk (or turn start).
    pub fn silence_ms(&self) -> u64 {
        self.last_speech
            .map(|last| self.clock.now().duration_since(last).as_millis() as u64)
            .unwrap_or(0)
    }

    /// Poll check: has silence reached the threshold?
    ///
    /// Returns false when no turn is active.
    pub fn should_end_turn(&self) -> bool {
        self.is_active() && self.silence_ms() >= self.config.silence_threshold_ms
    }

    /// Stop tracking, e.g. when the turn ends or the session stops.
    pub fn end_turn(&mut self) {
        self.last_speech = None;
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Update the silence threshold for subsequent turns.
    pub fn set_silence_threshold_ms(&mut self, threshold_ms: u64) {
        self.config.silence_threshold_ms = threshold_ms;
    }
}
