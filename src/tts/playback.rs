//! Response playback with cancellation.
//!
//! Playback blocks its caller (the pipeline worker) until the audio ends or
//! the cancel token fires. The token is shared with the session controller so
//! `interrupt()` can stop playback from another thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Result, VoxloopError};

/// Shared cancellation flag for one playback.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Trait for playing synthesized audio.
///
/// `play` blocks until the audio finishes or `cancel` fires; a cancelled
/// playback returns Ok, since interruption is a normal outcome.
pub trait AudioPlayback: Send {
    fn play(&mut self, audio: &[u8], cancel: &CancelToken) -> Result<()>;
}

/// Playback via an external player command (e.g. `mpv`, `ffplay`).
///
/// Writes the audio to a temporary file, spawns the player on it, and polls
/// the cancel token while the player runs, killing it on interrupt.
pub struct CommandPlayback {
    player: String,
    args: Vec<String>,
    poll_interval: Duration,
}

impl CommandPlayback {
    pub fn new(player: &str) -> Self {
        Self {
            player: player.to_string(),
            args: Vec::new(),
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Extra arguments placed before the file path.
    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    fn temp_path() -> std::path::PathBuf {
        let unique = format!(
            "voxloop-{}-{}.audio",
            std::process::id(),
            crate::bus::now_ms()
        );
        std::env::temp_dir().join(unique)
    }
}

impl AudioPlayback for CommandPlayback {
    fn play(&mut self, audio: &[u8], cancel: &CancelToken) -> Result<()> {
        let path = Self::temp_path();
        std::fs::write(&path, audio)?;

        let spawn_result = std::process::Command::new(&self.player)
            .args(&self.args)
            .arg(&path)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();

        let mut child = match spawn_result {
            Ok(child) => child,
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(VoxloopError::Playback {
                    message: format!("failed to spawn {}: {}", self.player, e),
                });
            }
        };

        let result = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                break Ok(());
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        break Ok(());
                    }
                    break Err(VoxloopError::Playback {
                        message: format!("{} exited with {}", self.player, status),
                    });
                }
                Ok(None) => std::thread::sleep(self.poll_interval),
                Err(e) => {
                    break Err(VoxloopError::Playback {
                        message: format!("failed to wait on {}: {}", self.player, e),
                    });
                }
            }
        };

        let _ = std::fs::remove_file(&path);
        result
    }
}

/// Mock playback for testing.
///
/// Records played payloads and whether each play saw a cancelled token.
#[derive(Debug, Clone, Default)]
pub struct MockPlayback {
    played: Arc<Mutex<Vec<Vec<u8>>>>,
    cancelled_plays: Arc<Mutex<usize>>,
    should_fail: bool,
}

impl MockPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn play_count(&self) -> usize {
        self.played.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Plays that observed a cancelled token.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled_plays.lock().map(|c| *c).unwrap_or(0)
    }
}

impl AudioPlayback for MockPlayback {
    fn play(&mut self, audio: &[u8], cancel: &CancelToken) -> Result<()> {
        if self.should_fail {
            return Err(VoxloopError::Playback {
                message: "mock playback failure".to_string(),
            });
        }
        if let Ok(mut played) = self.played.lock() {
            played.push(audio.to_vec());
        }
        if cancel.is_cancelled()
            && let Ok(mut count) = self.cancelled_plays.lock()
        {
            *count += 1;
        }
        Ok(())
    }
}
