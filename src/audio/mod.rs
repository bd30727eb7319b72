//! Audio input: device abstraction and level monitoring.

#[cfg(feature = "cpal-audio")]
pub mod cpal_source;
pub mod level;
pub mod source;

pub use level::{AudioLevel, LevelMonitor, calculate_rms};
pub use source::{AudioSource, AudioSourceConfig, MockAudioSource};
