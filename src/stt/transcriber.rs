use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::capture::Utterance;
use crate::error::{Result, TranscriptionFailure, VoxloopError};

/// Result of transcribing one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
}

/// Trait for speech-to-text transcription.
///
/// One attempt per utterance: a failed transcription drops the turn and the
/// session returns to listening, so retry policy lives with the caller's
/// error handling rather than here.
pub trait Transcriber: Send + Sync {
    /// Transcribe a complete utterance to text.
    fn transcribe(&self, utterance: &Utterance) -> Result<Transcript>;

    /// Name of the backing service, for session summaries.
    fn provider_name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> to allow sharing across threads.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, utterance: &Utterance) -> Result<Transcript> {
        (**self).transcribe(utterance)
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}

/// Mock transcriber for testing.
#[derive(Debug)]
pub struct MockTranscriber {
    provider: String,
    response: String,
    failure: Option<TranscriptionFailure>,
    calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            provider: "mock-stt".to_string(),
            response: "mock transcription".to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the mock to return a specific transcript.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail with the given failure kind.
    pub fn with_failure(mut self, failure: TranscriptionFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Configure the mock to return an empty transcript failure.
    pub fn with_empty_result(self) -> Self {
        self.with_failure(TranscriptionFailure::EmptyResult)
    }

    /// Number of transcription calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _utterance: &Utterance) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(failure) => Err(VoxloopError::Transcription {
                failure: failure.clone(),
            }),
            None => Ok(Transcript {
                text: self.response.clone(),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance() -> Utterance {
        Utterance {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
        }
    }

    #[test]
    fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new().with_response("Hello, this is a test");

        let result = transcriber.transcribe(&utterance());

        assert_eq!(result.unwrap().text, "Hello, this is a test");
    }

    #[test]
    fn test_mock_transcriber_timeout_failure() {
        let transcriber = MockTranscriber::new().with_failure(TranscriptionFailure::Timeout);

        match transcriber.transcribe(&utterance()) {
            Err(VoxloopError::Transcription { failure }) => {
                assert_eq!(failure, TranscriptionFailure::Timeout);
            }
            other => panic!("Expected Transcription error, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_transcriber_empty_result() {
        let transcriber = MockTranscriber::new().with_empty_result();

        match transcriber.transcribe(&utterance()) {
            Err(VoxloopError::Transcription { failure }) => {
                assert_eq!(failure, TranscriptionFailure::EmptyResult);
            }
            other => panic!("Expected Transcription error, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_transcriber_counts_calls() {
        let transcriber = MockTranscriber::new();
        assert_eq!(transcriber.call_count(), 0);

        transcriber.transcribe(&utterance()).unwrap();
        transcriber.transcribe(&utterance()).unwrap();
        assert_eq!(transcriber.call_count(), 2);
    }

    #[test]
    fn test_transcriber_trait_is_object_safe() {
        let transcriber: Box<dyn Transcriber> =
            Box::new(MockTranscriber::new().with_response("boxed test"));

        assert_eq!(transcriber.provider_name(), "mock-stt");
        assert_eq!(transcriber.transcribe(&utterance()).unwrap().text, "boxed test");
    }

    #[test]
    fn test_arc_transcriber_shares_call_count() {
        let transcriber = Arc::new(MockTranscriber::new());
        let shared = Arc::clone(&transcriber);

        shared.transcribe(&utterance()).unwrap();
        assert_eq!(transcriber.call_count(), 1);
    }
}
