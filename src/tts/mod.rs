//! Speech synthesis: primary HTTP tier, local fallback, playback.

pub mod chain;
pub mod local;
pub mod playback;
pub mod remote;
pub mod synthesizer;

pub use chain::{FallbackChain, RetryPolicy, Sleeper, SynthesisOutcome, ThreadSleeper};
pub use local::CommandSynthesizer;
pub use playback::{AudioPlayback, CancelToken, CommandPlayback, MockPlayback};
pub use remote::{HttpSynthesizer, HttpSynthesizerConfig};
pub use synthesizer::{AttemptError, MockSynthesizer, Synthesizer, Voice, validate_speed};
