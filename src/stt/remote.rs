//! HTTP transcription client.
//!
//! Posts the WAV-encoded utterance to an OpenAI-compatible
//! `/audio/transcriptions` endpoint as multipart form data. One attempt per
//! utterance; the request timeout is the only time bound.

use std::io::Cursor;
use std::time::Duration;

use reqwest::blocking::multipart;

use crate::capture::Utterance;
use crate::defaults;
use crate::error::{Result, TranscriptionFailure, VoxloopError};
use crate::stt::transcriber::{Transcript, Transcriber};

/// Configuration for the remote transcription service.
#[derive(Debug, Clone)]
pub struct HttpTranscriberConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for HttpTranscriberConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(defaults::STT_TIMEOUT_SECS),
        }
    }
}

pub struct HttpTranscriber {
    config: HttpTranscriberConfig,
    client: reqwest::blocking::Client,
}

impl HttpTranscriber {
    pub fn new(config: HttpTranscriberConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VoxloopError::Other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, utterance: &Utterance) -> Result<Transcript> {
        let wav = encode_wav(utterance)?;

        let part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoxloopError::Other(format!("invalid mime type: {}", e)))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .map_err(|e| {
                let failure = if e.is_timeout() {
                    TranscriptionFailure::Timeout
                } else {
                    TranscriptionFailure::Service {
                        status: 0,
                        message: e.to_string(),
                    }
                };
                VoxloopError::Transcription { failure }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(VoxloopError::Transcription {
                failure: TranscriptionFailure::Service {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body: serde_json::Value = response.json().map_err(|e| {
            VoxloopError::Transcription {
                failure: TranscriptionFailure::Service {
                    status: status.as_u16(),
                    message: format!("malformed response: {}", e),
                },
            }
        })?;

        let text = body
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(VoxloopError::Transcription {
                failure: TranscriptionFailure::EmptyResult,
            });
        }

        Ok(Transcript { text })
    }

    fn provider_name(&self) -> &str {
        &self.config.model
    }
}

/// Encode an utterance as an in-memory mono 16-bit WAV file.
fn encode_wav(utterance: &Utterance) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: utterance.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| VoxloopError::Other(format!("WAV encode failed: {}", e)))?;
        for &sample in &utterance.samples {
            writer
                .write_sample(sample)
                .map_err(|e| VoxloopError::Other(format!("WAV encode failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| VoxloopError::Other(format!("WAV encode failed: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_header_and_size() {
        let utterance = Utterance {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
        };
        let wav = encode_wav(&utterance).unwrap();

        // RIFF header + 2 bytes per sample.
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 1600 * 2);
    }

    #[test]
    fn test_encode_wav_round_trip() {
        let utterance = Utterance {
            samples: vec![100i16, -200, 300, -400],
            sample_rate: 16000,
        };
        let wav = encode_wav(&utterance).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, utterance.samples);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let transcriber = HttpTranscriber::new(HttpTranscriberConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            transcriber.endpoint(),
            "https://api.example.com/v1/audio/transcriptions"
        );
    }

    #[test]
    fn test_provider_name_is_model() {
        let transcriber = HttpTranscriber::new(HttpTranscriberConfig::default()).unwrap();
        assert_eq!(transcriber.provider_name(), "whisper-1");
    }

    #[test]
    fn test_default_config() {
        let config = HttpTranscriberConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.model, "whisper-1");
    }
}
