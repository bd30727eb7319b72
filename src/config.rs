use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::defaults;
use crate::dialogue::DialogueMode;
use crate::error::{Result, VoxloopError};
use crate::tts::synthesizer::{Voice, validate_speed};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub segmenter: SegmenterSection,
    pub stt: SttConfig,
    pub dialogue: DialogueConfig,
    pub tts: TtsConfig,
    pub session: SessionSection,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub speech_threshold: f32,
}

/// Turn segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterSection {
    pub silence_threshold_ms: u64,
    pub poll_interval_ms: u64,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

/// Dialogue service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DialogueConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub system_instructions: Option<String>,
    pub user_id: Option<String>,
}

/// Speech synthesis and playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: Voice,
    pub speed: f32,
    pub timeout_secs: u64,
    /// Local engine used when the remote tier is exhausted.
    pub fallback_command: String,
    /// External player command for response audio.
    pub player: String,
    pub player_args: Vec<String>,
}

/// Session-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub mode: DialogueMode,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            speech_threshold: defaults::SPEECH_THRESHOLD,
        }
    }
}

impl Default for SegmenterSection {
    fn default() -> Self {
        Self {
            silence_threshold_ms: defaults::SILENCE_THRESHOLD_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            timeout_secs: defaults::STT_TIMEOUT_SECS,
        }
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: defaults::DIALOGUE_TIMEOUT_SECS,
            system_instructions: None,
            user_id: None,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "tts-1".to_string(),
            voice: Voice::default(),
            speed: defaults::DEFAULT_SPEED,
            timeout_secs: defaults::TTS_ATTEMPT_TIMEOUT_SECS,
            fallback_command: "espeak".to_string(),
            player: "mpv".to_string(),
            player_args: vec!["--no-terminal".to_string()],
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            mode: DialogueMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxloopError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxloopError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoxloopError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        validate_speed(self.tts.speed)?;
        if !(0.0..=1.0).contains(&self.audio.speech_threshold) {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "audio.speech_threshold".to_string(),
                message: format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.audio.speech_threshold
                ),
            });
        }
        if self.segmenter.silence_threshold_ms == 0 {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "segmenter.silence_threshold_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.segmenter.poll_interval_ms == 0 {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "segmenter.poll_interval_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLOOP_API_KEY → stt/dialogue/tts api_key (where unset in the file)
    /// - VOXLOOP_AUDIO_DEVICE → audio.device
    /// - VOXLOOP_MODE → session.mode
    /// - VOXLOOP_VOICE → tts.voice
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("VOXLOOP_API_KEY")
            && !key.is_empty()
        {
            self.stt.api_key.get_or_insert_with(|| key.clone());
            self.dialogue.api_key.get_or_insert_with(|| key.clone());
            self.tts.api_key.get_or_insert_with(|| key.clone());
        }

        if let Ok(device) = std::env::var("VOXLOOP_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(mode) = std::env::var("VOXLOOP_MODE")
            && !mode.is_empty()
        {
            match mode.parse() {
                Ok(mode) => self.session.mode = mode,
                Err(e) => tracing::warn!("ignoring VOXLOOP_MODE: {}", e),
            }
        }

        if let Ok(voice) = std::env::var("VOXLOOP_VOICE")
            && !voice.is_empty()
        {
            match voice.parse() {
                Ok(voice) => self.tts.voice = voice,
                Err(e) => tracing::warn!("ignoring VOXLOOP_VOICE: {}", e),
            }
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxloop/config.toml on Linux, or `None` when the
    /// config directory cannot be determined.
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxloop").join("config.toml"))
    }
}
