//! Speech-to-text: transcription seam and HTTP client.

pub mod remote;
pub mod transcriber;

pub use remote::HttpTranscriber;
pub use transcriber::{MockTranscriber, Transcript, Transcriber};
