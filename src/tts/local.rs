//! Local synthesis via an external TTS command.
//!
//! The fallback tier behind the HTTP synthesizer. It shells out to a local
//! engine (espeak by default) writing a WAV file, so responses stay audible
//! when the remote service is down. Local synthesis is free; the chain bills
//! it at zero cost.

use std::process::Command;

use crate::tts::synthesizer::{AttemptError, Synthesizer};

/// Synthesizer backed by a local command that writes a WAV file.
///
/// The command is invoked as `<command> [args..] -w <path> <text>`, the
/// espeak convention.
pub struct CommandSynthesizer {
    command: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the output flag.
    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    fn temp_path() -> std::path::PathBuf {
        let unique = format!(
            "voxloop-tts-{}-{}.wav",
            std::process::id(),
            crate::bus::now_ms()
        );
        std::env::temp_dir().join(unique)
    }
}

impl Synthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, AttemptError> {
        let path = Self::temp_path();

        let status = Command::new(&self.command)
            .args(&self.args)
            .arg("-w")
            .arg(&path)
            .arg(text)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map_err(|e| AttemptError::Fatal {
                message: format!("failed to run {}: {}", self.command, e),
            })?;

        if !status.success() {
            let _ = std::fs::remove_file(&path);
            return Err(AttemptError::Fatal {
                message: format!("{} exited with {}", self.command, status),
            });
        }

        let audio = std::fs::read(&path).map_err(|e| AttemptError::Fatal {
            message: format!("failed to read synthesized audio: {}", e),
        });
        let _ = std::fs::remove_file(&path);

        let audio = audio?;
        if audio.is_empty() {
            return Err(AttemptError::Fatal {
                message: format!("{} produced no audio", self.command),
            });
        }
        Ok(audio)
    }

    fn provider_name(&self) -> &str {
        &self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_command_is_fatal() {
        let synth = CommandSynthesizer::new("definitely-not-a-real-tts-xyz");
        match synth.synthesize("hello") {
            Err(AttemptError::Fatal { message }) => {
                assert!(message.contains("failed to run"));
            }
            other => panic!("Expected fatal error, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_name_is_the_command() {
        let synth = CommandSynthesizer::new("espeak");
        assert_eq!(synth.provider_name(), "espeak");
    }
}
