//! Primary HTTP synthesis tier.
//!
//! JSON POST to an OpenAI-compatible `/audio/speech` endpoint, returning
//! encoded audio bytes. Status codes map onto the retry classification:
//! 429 and 5xx (and timeouts) are retryable, everything else is fatal for
//! this tier.

use std::time::Duration;

use crate::defaults;
use crate::error::{Result, VoxloopError};
use crate::tts::synthesizer::{AttemptError, Synthesizer, Voice, validate_speed};

/// Configuration for the remote synthesis service.
#[derive(Debug, Clone)]
pub struct HttpSynthesizerConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: Voice,
    /// Playback speed multiplier, validated to [0.25, 4.0].
    pub speed: f32,
    pub timeout: Duration,
}

impl Default for HttpSynthesizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "tts-1".to_string(),
            voice: Voice::default(),
            speed: defaults::DEFAULT_SPEED,
            timeout: Duration::from_secs(defaults::TTS_ATTEMPT_TIMEOUT_SECS),
        }
    }
}

pub struct HttpSynthesizer {
    config: HttpSynthesizerConfig,
    client: reqwest::blocking::Client,
}

impl HttpSynthesizer {
    pub fn new(config: HttpSynthesizerConfig) -> Result<Self> {
        validate_speed(config.speed)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VoxloopError::Other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'))
    }
}

/// Whether a status code is worth retrying against the same tier.
fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

impl Synthesizer for HttpSynthesizer {
    fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, AttemptError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
            "voice": self.config.voice.as_str(),
            "speed": self.config.speed,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Retryable {
                        message: "request timed out".to_string(),
                    }
                } else {
                    AttemptError::Retryable {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = format!("status {}", status);
            return Err(if is_retryable_status(status) {
                AttemptError::Retryable { message }
            } else {
                AttemptError::Fatal { message }
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| AttemptError::Retryable {
                message: format!("truncated response: {}", e),
            })?
            .to_vec();

        if bytes.is_empty() {
            return Err(AttemptError::Fatal {
                message: "empty audio response".to_string(),
            });
        }

        Ok(bytes)
    }

    fn provider_name(&self) -> &str {
        &self.config.model
    }
}
