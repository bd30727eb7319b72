//! Capture session: device ownership and utterance assembly.
//!
//! The audio device is acquired once when the session opens and held until
//! the session drops, so back-to-back turns never race on device setup.
//! While a recording is active, chunks read on the poll cadence accumulate
//! into a buffer that becomes one immutable [`Utterance`] when the turn ends.

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::Result;

/// One complete user utterance, ready for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// 16-bit PCM mono samples.
    pub samples: Vec<i16>,
    /// Sample rate the audio was captured at.
    pub sample_rate: u32,
}

impl Utterance {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Owns the audio source for the lifetime of a session.
pub struct CaptureSession {
    source: Box<dyn AudioSource>,
    sample_rate: u32,
    recording: bool,
    speech_seen: bool,
    buffer: Vec<i16>,
}

impl CaptureSession {
    /// Acquire the device and start its stream.
    ///
    /// This is the only fatal acquisition point in a session: if the device
    /// cannot be opened, the session cannot start.
    pub fn open(mut source: Box<dyn AudioSource>, sample_rate: u32) -> Result<Self> {
        source.start()?;
        Ok(Self {
            source,
            sample_rate,
            recording: false,
            speech_seen: false,
            buffer: Vec::new(),
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Begin accumulating a new utterance.
    pub fn begin_recording(&mut self) {
        self.buffer.clear();
        self.speech_seen = false;
        self.recording = true;
    }

    /// Mark that the current recording carried speech-level audio.
    ///
    /// The capture loop calls this when the level monitor classifies a
    /// chunk as speech. A recording that never saw one holds only room
    /// noise and is discarded at the end of the turn.
    pub fn note_speech(&mut self) {
        self.speech_seen = true;
    }

    /// Read whatever the device produced since the last poll.
    ///
    /// The chunk is appended to the utterance buffer while recording; either
    /// way it is returned so the caller can feed the level monitor.
    pub fn poll_chunk(&mut self) -> Result<Vec<i16>> {
        let chunk = self.source.read_samples()?;
        if self.recording && !chunk.is_empty() {
            self.buffer.extend_from_slice(&chunk);
        }
        Ok(chunk)
    }

    /// End the current recording and take the accumulated utterance.
    ///
    /// Returns `None` when no audio accumulated or when no chunk was ever
    /// [`note_speech`](Self::note_speech)-ed; such turns are discarded
    /// rather than sent for transcription.
    pub fn finish_recording(&mut self) -> Option<Utterance> {
        self.recording = false;
        if self.buffer.is_empty() || !self.speech_seen {
            self.buffer.clear();
            return None;
        }
        Some(Utterance {
            samples: std::mem::take(&mut self.buffer),
            sample_rate: self.sample_rate,
        })
    }

    /// Duration of audio accumulated so far in the current recording.
    pub fn buffered_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.buffer.len() as u64 * 1000) / self.sample_rate as u64
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.source.stop() {
            tracing::warn!("failed to release audio device: {}", e);
        }
    }
}

/// Number of samples in one capture chunk at the given rate.
pub fn chunk_samples(sample_rate: u32) -> usize {
    (sample_rate as u64 * defaults::CAPTURE_CHUNK_MS / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MockAudioSource;

    #[test]
    fn test_open_starts_the_source() {
        let source = MockAudioSource::new();
        let session = CaptureSession::open(Box::new(source), 16000);
        assert!(session.is_ok());
    }

    #[test]
    fn test_open_fails_when_device_unavailable() {
        let source = MockAudioSource::new().with_start_failure();
        let session = CaptureSession::open(Box::new(source), 16000);
        assert!(session.is_err());
    }

    #[test]
    fn test_recording_accumulates_chunks() {
        let source = MockAudioSource::new()
            .with_chunk(vec![1i16, 2])
            .with_chunk(vec![3i16, 4]);
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        session.begin_recording();
        session.poll_chunk().unwrap();
        session.note_speech();
        session.poll_chunk().unwrap();

        let utterance = session.finish_recording().unwrap();
        assert_eq!(utterance.samples, vec![1i16, 2, 3, 4]);
        assert_eq!(utterance.sample_rate, 16000);
    }

    #[test]
    fn test_chunks_outside_recording_are_not_buffered() {
        let source = MockAudioSource::new()
            .with_chunk(vec![1i16, 2])
            .with_chunk(vec![3i16, 4]);
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        // First chunk arrives before recording starts.
        session.poll_chunk().unwrap();
        session.begin_recording();
        session.poll_chunk().unwrap();
        session.note_speech();

        let utterance = session.finish_recording().unwrap();
        assert_eq!(utterance.samples, vec![3i16, 4]);
    }

    #[test]
    fn test_empty_recording_is_discarded() {
        let source = MockAudioSource::new();
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        session.begin_recording();
        session.poll_chunk().unwrap();
        assert!(session.finish_recording().is_none());
    }

    #[test]
    fn test_recording_without_speech_is_discarded() {
        // Non-empty chunks, but the loop never classified any as speech:
        // the turn holds only room noise and must not be forwarded.
        let source = MockAudioSource::new().with_tone_chunks(3, 50, 1600);
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        session.begin_recording();
        for _ in 0..3 {
            session.poll_chunk().unwrap();
        }
        assert!(session.finish_recording().is_none());
    }

    #[test]
    fn test_speech_flag_resets_between_recordings() {
        let source = MockAudioSource::new()
            .with_chunk(vec![5000i16; 4])
            .with_chunk(vec![10i16; 4]);
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        session.begin_recording();
        session.poll_chunk().unwrap();
        session.note_speech();
        assert!(session.finish_recording().is_some());

        // The next turn is quiet; the old flag must not carry over.
        session.begin_recording();
        session.poll_chunk().unwrap();
        assert!(session.finish_recording().is_none());
    }

    #[test]
    fn test_finish_clears_recording_flag() {
        let source = MockAudioSource::new().with_chunk(vec![1i16]);
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        session.begin_recording();
        assert!(session.is_recording());
        session.poll_chunk().unwrap();
        session.note_speech();
        session.finish_recording();
        assert!(!session.is_recording());
    }

    #[test]
    fn test_back_to_back_recordings_do_not_leak_audio() {
        let source = MockAudioSource::new()
            .with_chunk(vec![1i16, 2])
            .with_chunk(vec![3i16, 4]);
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        session.begin_recording();
        session.poll_chunk().unwrap();
        session.note_speech();
        let first = session.finish_recording().unwrap();
        assert_eq!(first.samples, vec![1i16, 2]);

        session.begin_recording();
        session.poll_chunk().unwrap();
        session.note_speech();
        let second = session.finish_recording().unwrap();
        assert_eq!(second.samples, vec![3i16, 4]);
    }

    #[test]
    fn test_utterance_duration() {
        let utterance = Utterance {
            samples: vec![0i16; 16000],
            sample_rate: 16000,
        };
        assert_eq!(utterance.duration_ms(), 1000);

        let half = Utterance {
            samples: vec![0i16; 8000],
            sample_rate: 16000,
        };
        assert_eq!(half.duration_ms(), 500);
    }

    #[test]
    fn test_buffered_ms() {
        let source = MockAudioSource::new().with_chunk(vec![0i16; 1600]);
        let mut session = CaptureSession::open(Box::new(source), 16000).unwrap();

        session.begin_recording();
        session.poll_chunk().unwrap();
        assert_eq!(session.buffered_ms(), 100);
    }

    #[test]
    fn test_chunk_samples_at_16khz() {
        assert_eq!(chunk_samples(16000), 1600);
    }
}
