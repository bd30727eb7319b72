//! Audio level monitoring.
//!
//! Tracks a rolling RMS amplitude over the most recent samples and classifies
//! each reading against the speech threshold. One reading is produced per
//! capture tick and published as an `audio_level` event.

use std::collections::VecDeque;

use crate::defaults;

/// One amplitude reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioLevel {
    /// Normalized RMS amplitude, 0.0 to 1.0.
    pub amplitude: f32,
    /// Whether the amplitude is above the speech threshold.
    pub is_speech: bool,
}

/// Rolling-window RMS monitor.
#[derive(Debug)]
pub struct LevelMonitor {
    window: VecDeque<i16>,
    window_size: usize,
    speech_threshold: f32,
}

impl LevelMonitor {
    pub fn new(speech_threshold: f32) -> Self {
        Self::with_window(speech_threshold, defaults::LEVEL_WINDOW_SAMPLES)
    }

    pub fn with_window(speech_threshold: f32, window_size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            speech_threshold,
        }
    }

    /// Feed one chunk of samples and read the current level.
    ///
    /// The window keeps the most recent `window_size` samples, so short
    /// chunks are measured in the context of what preceded them.
    pub fn feed(&mut self, samples: &[i16]) -> AudioLevel {
        for &sample in samples {
            if self.window.len() == self.window_size {
                self.window.pop_front();
            }
            self.window.push_back(sample);
        }

        let (front, back) = self.window.as_slices();
        let amplitude = calculate_rms_parts(front, back);
        AudioLevel {
            amplitude,
            is_speech: amplitude > self.speech_threshold,
        }
    }

    /// Clear the window, e.g. between recordings.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    calculate_rms_parts(samples, &[])
}

fn calculate_rms_parts(front: &[i16], back: &[i16]) -> f32 {
    let len = front.len() + back.len();
    if len == 0 {
        return 0.0;
    }

    let sum_squares: f64 = front
        .iter()
        .chain(back.iter())
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / len as f64;
    mean_square.sqrt() as f32
}
