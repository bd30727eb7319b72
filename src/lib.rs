//! voxloop - Real-time voice conversation sessions
//!
//! Microphone capture, silence-based turn taking, transcription, dialogue,
//! and spoken responses, orchestrated over an ordered event bus.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod bus;
pub mod capture;
pub mod config;
pub mod defaults;
pub mod dialogue;
pub mod error;
pub mod segmenter;
pub mod session;
pub mod stt;
pub mod tts;

// Core seams (capture → transcribe → respond → speak)
pub use audio::source::AudioSource;
pub use dialogue::client::DialogueClient;
pub use stt::transcriber::Transcriber;
pub use tts::playback::AudioPlayback;
pub use tts::synthesizer::Synthesizer;

// Session orchestration
pub use bus::{EventBus, EventKind, SessionEvent};
pub use session::{SessionBackends, SessionConfig, SessionController, SessionRegistry, SessionSummary};

// Error handling
pub use error::{Result, VoxloopError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        // In a git repo build, GIT_HASH is set → expect "0.1.0+<hash>"
        // In CI without git, expect plain "0.1.0"
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(
                hash_part.len(),
                7,
                "Git hash should be 7 chars, got: {}",
                hash_part
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
