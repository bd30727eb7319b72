//! Two-tier synthesis with retry and fallback.
//!
//! The primary tier gets up to [`defaults::TTS_MAX_ATTEMPTS`] attempts with
//! exponential backoff on retryable failures; a fatal failure skips the
//! remaining attempts. Only when the primary is exhausted does the chain run
//! the local fallback, which costs nothing. Primary synthesis is billed per
//! character.

use std::time::Duration;

use crate::defaults;
use crate::error::{Result, VoxloopError};
use crate::tts::synthesizer::Synthesizer;

/// Trait for backoff sleeps, so tests run without real delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper using `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Result of running the chain for one response.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    pub audio: Vec<u8>,
    /// Which tier produced the audio.
    pub provider: String,
    /// Set when the local fallback produced the audio, with the reason the
    /// primary was abandoned.
    pub fallback_reason: Option<String>,
    /// Dollar cost of this synthesis. Zero when the fallback produced it.
    pub cost: f64,
}

impl SynthesisOutcome {
    pub fn fell_back(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Retry/backoff policy for the primary tier.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::TTS_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(defaults::TTS_BACKOFF_BASE_MS),
            backoff_cap: Duration::from_millis(defaults::TTS_BACKOFF_CAP_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt` (1-based) failed.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(10);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }
}

/// Primary synthesizer with a local fallback behind it.
pub struct FallbackChain {
    primary: Box<dyn Synthesizer>,
    fallback: Box<dyn Synthesizer>,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl FallbackChain {
    pub fn new(primary: Box<dyn Synthesizer>, fallback: Box<dyn Synthesizer>) -> Self {
        Self::with_policy(primary, fallback, RetryPolicy::default(), Box::new(ThreadSleeper))
    }

    pub fn with_policy(
        primary: Box<dyn Synthesizer>,
        fallback: Box<dyn Synthesizer>,
        policy: RetryPolicy,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            primary,
            fallback,
            policy,
            sleeper,
        }
    }

    pub fn primary_provider(&self) -> &str {
        self.primary.provider_name()
    }

    /// Synthesize `text`, trying the primary tier first.
    ///
    /// Errors only when both tiers fail; a successful fallback is a success
    /// with `fallback_reason` set.
    pub fn synthesize(&self, text: &str) -> Result<SynthesisOutcome> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match self.primary.synthesize(text) {
                Ok(audio) => {
                    return Ok(SynthesisOutcome {
                        audio,
                        provider: self.primary.provider_name().to_string(),
                        fallback_reason: None,
                        cost: primary_cost(text),
                    });
                }
                Err(error) => {
                    last_error = error.to_string();
                    tracing::warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        "primary synthesis failed: {}",
                        last_error
                    );
                    if !error.is_retryable() {
                        break;
                    }
                    if attempt < self.policy.max_attempts {
                        self.sleeper.sleep(self.policy.backoff_delay(attempt));
                    }
                }
            }
        }

        match self.fallback.synthesize(text) {
            Ok(audio) => Ok(SynthesisOutcome {
                audio,
                provider: self.fallback.provider_name().to_string(),
                fallback_reason: Some(last_error),
                cost: 0.0,
            }),
            Err(fallback_error) => Err(VoxloopError::Synthesis {
                message: format!(
                    "primary failed ({}), fallback failed ({})",
                    last_error, fallback_error
                ),
            }),
        }
    }
}

/// Dollar cost of one primary synthesis, billed per input character.
pub fn primary_cost(text: &str) -> f64 {
    text.chars().count() as f64 / 1_000_000.0 * defaults::TTS_COST_PER_MILLION_CHARS
}
