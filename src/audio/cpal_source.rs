//! Microphone capture using CPAL (Cross-Platform Audio Library).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, VoxloopError};

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched through `CpalAudioSource`, which is
/// driven from a single capture thread at a time.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone-backed audio source.
///
/// Captures 16-bit PCM at 16kHz mono, falling back from an i16 stream to an
/// f32 stream with software conversion when the device only exposes floats.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
    buffer: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
}

impl CpalAudioSource {
    /// Open an input device by name, or the system default when `None`.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name {
            let devices = host
                .input_devices()
                .map_err(|e| VoxloopError::DeviceUnavailable {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

            devices
                .into_iter()
                .find(|dev| dev.name().is_ok_and(|n| n == name))
                .ok_or_else(|| VoxloopError::DeviceUnavailable {
                    message: format!("input device not found: {}", name),
                })?
        } else {
            host.default_input_device()
                .ok_or_else(|| VoxloopError::DeviceUnavailable {
                    message: "no default input device".to_string(),
                })?
        };

        Ok(Self {
            device,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            sample_rate: defaults::SAMPLE_RATE,
        })
    }

    fn build_stream(&self) -> Result<cpal::Stream> {
        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            tracing::warn!("audio stream error: {}", err);
        };

        // i16 first: PipeWire/PulseAudio convert transparently.
        let buffer = Arc::clone(&self.buffer);
        if let Ok(stream) = self.device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // f32 fallback for devices that only expose float formats.
        let buffer = Arc::clone(&self.buffer);
        self.device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(
                            data.iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                        );
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| VoxloopError::DeviceUnavailable {
                message: format!("Failed to build input stream: {}", e),
            })
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = self.build_stream()?;
        stream.play().map_err(|e| VoxloopError::DeviceUnavailable {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream
                .0
                .pause()
                .map_err(|e| VoxloopError::DeviceUnavailable {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|e| VoxloopError::DeviceUnavailable {
                message: format!("Failed to lock audio buffer: {}", e),
            })?;
        Ok(std::mem::take(&mut *buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_with_invalid_device_name() {
        let source = CpalAudioSource::new(Some("NonExistentDevice12345"));
        match source {
            Err(VoxloopError::DeviceUnavailable { message }) => {
                assert!(message.contains("NonExistentDevice12345") || message.contains("enumerate"));
            }
            Ok(_) => panic!("Expected DeviceUnavailable error"),
            Err(other) => panic!("Expected DeviceUnavailable, got {:?}", other),
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_capture_round_trip() {
        let mut source = CpalAudioSource::new(None).expect("Failed to create audio source");
        source.start().expect("Failed to start");
        std::thread::sleep(std::time::Duration::from_millis(100));
        let _ = source.read_samples().expect("Failed to read samples");
        source.stop().expect("Failed to stop");
    }
}
