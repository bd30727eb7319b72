use std::collections::VecDeque;

use crate::defaults;
use crate::error::{Result, VoxloopError};

/// Trait for audio input devices.
///
/// This trait allows swapping implementations (real microphone vs mock).
/// The device is acquired once per session and reused across utterances.
pub trait AudioSource: Send {
    /// Start delivering audio from the device.
    fn start(&mut self) -> Result<()>;

    /// Stop delivering audio and release the stream.
    fn stop(&mut self) -> Result<()>;

    /// Drain whatever samples accumulated since the last read.
    ///
    /// # Returns
    /// 16-bit PCM mono samples at the configured rate. An empty vector means
    /// no audio arrived in this interval, not an error.
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Configuration for audio source initialization.
#[derive(Debug, Clone)]
pub struct AudioSourceConfig {
    pub sample_rate: u32,
    pub device_name: Option<String>,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            device_name: None,
        }
    }
}

/// Mock audio source for testing.
///
/// Plays back a scripted sequence of chunks, one per `read_samples` call,
/// then returns empty chunks (silence gaps in a real capture loop).
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    chunks: VecDeque<Vec<i16>>,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    pub fn new() -> Self {
        Self {
            is_started: false,
            chunks: VecDeque::new(),
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Queue one chunk to be returned by a future `read_samples` call.
    pub fn with_chunk(mut self, samples: Vec<i16>) -> Self {
        self.chunks.push_back(samples);
        self
    }

    /// Queue `count` identical chunks filled with the given amplitude.
    pub fn with_tone_chunks(mut self, count: usize, amplitude: i16, len: usize) -> Self {
        for _ in 0..count {
            self.chunks.push_back(vec![amplitude; len]);
        }
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Chunks not yet consumed by `read_samples`.
    pub fn remaining_chunks(&self) -> usize {
        self.chunks.len()
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(VoxloopError::DeviceUnavailable {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            Err(VoxloopError::DeviceUnavailable {
                message: self.error_message.clone(),
            })
        } else {
            Ok(self.chunks.pop_front().unwrap_or_default())
        }
    }
}
