//! Default configuration constants for voxloop.
//!
//! Shared constants used across configuration types to ensure consistency
//! and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and upload size for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Rolling window size (in samples) for RMS amplitude measurement.
///
/// 2048 samples at 16kHz is ~128ms of audio, short enough to track speech
/// onsets while smoothing over single-sample spikes.
pub const LEVEL_WINDOW_SAMPLES: usize = 2048;

/// RMS amplitude threshold (0.0 to 1.0) above which a chunk counts as speech.
///
/// Tuned for typical microphone input levels; filters ambient noise while
/// staying sensitive to quiet speech.
pub const SPEECH_THRESHOLD: f32 = 0.02;

/// Silence duration in milliseconds that ends a user turn.
///
/// 2000ms allows for natural mid-sentence pauses without prematurely
/// cutting the recording.
pub const SILENCE_THRESHOLD_MS: u64 = 2000;

/// Interval in milliseconds between silence checks while recording.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Duration of audio buffered per capture chunk, in milliseconds.
pub const CAPTURE_CHUNK_MS: u64 = 100;

/// Maximum number of prior messages sent as dialogue context.
pub const HISTORY_CONTEXT_LIMIT: usize = 5;

/// Canned acknowledgments for active mode, chosen uniformly at random.
pub const ACKNOWLEDGMENTS: [&str; 5] = [
    "I hear you.",
    "I'm listening.",
    "Go on.",
    "Tell me more.",
    "I'm with you.",
];

/// Timeout in seconds for a single transcription request.
pub const STT_TIMEOUT_SECS: u64 = 15;

/// Timeout in seconds for a dialogue request.
pub const DIALOGUE_TIMEOUT_SECS: u64 = 30;

/// Maximum attempts against the primary synthesis service before falling
/// back to local synthesis.
pub const TTS_MAX_ATTEMPTS: u32 = 3;

/// Base delay in milliseconds for exponential backoff between synthesis
/// attempts (1s, then 2s, 4s, ...).
pub const TTS_BACKOFF_BASE_MS: u64 = 1000;

/// Cap in milliseconds on any single backoff delay.
pub const TTS_BACKOFF_CAP_MS: u64 = 10_000;

/// Timeout in seconds for a single synthesis attempt.
pub const TTS_ATTEMPT_TIMEOUT_SECS: u64 = 30;

/// Primary synthesis price in dollars per million input characters.
pub const TTS_COST_PER_MILLION_CHARS: f64 = 0.015;

/// Dialogue price in dollars per thousand estimated tokens.
pub const DIALOGUE_COST_PER_1K_TOKENS: f64 = 0.003;

/// Characters per estimated token for dialogue cost accounting.
pub const CHARS_PER_TOKEN: usize = 4;

/// Minimum accepted playback speed multiplier.
pub const MIN_SPEED: f32 = 0.25;

/// Maximum accepted playback speed multiplier.
pub const MAX_SPEED: f32 = 4.0;

/// Default playback speed multiplier.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Idle duration in seconds after which a registry session is evicted.
pub const IDLE_EVICTION_SECS: u64 = 1800;
