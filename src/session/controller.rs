//! Session controller: thread wiring and lifecycle.
//!
//! Two threads per session. The capture thread owns the device: it polls
//! chunks on the 100ms cadence, publishes audio levels, and hands each
//! finished utterance to the pipeline worker. The worker runs the slow path
//! (transcribe → process → synthesize → play) so network stalls never block
//! the poll loop.
//!
//! Interruption is a sequence number: every utterance carries the sequence
//! it was captured under, and the worker re-checks it at each stage
//! boundary. `interrupt()` bumps the sequence and cancels playback, so
//! whatever the old turn still produces is discarded on arrival.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::audio::level::LevelMonitor;
use crate::audio::source::AudioSource;
use crate::bus::{CostStage, EventBus, EventKind};
use crate::capture::{CaptureSession, Utterance};
use crate::defaults;
use crate::dialogue::{DialogueMode, TurnProcessor};
use crate::error::{ErrorStage, Result, TranscriptionFailure, VoxloopError};
use crate::segmenter::{Clock, SegmenterConfig, TurnSegmenter};
use crate::session::state::SessionState;
use crate::session::summary::{Providers, SessionSummary};
use crate::stt::Transcriber;
use crate::tts::chain::FallbackChain;
use crate::tts::playback::{AudioPlayback, CancelToken};

/// Static configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_id: String,
    pub mode: DialogueMode,
    pub sample_rate: u32,
    pub speech_threshold: f32,
    pub segmenter: SegmenterConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: "default".to_string(),
            mode: DialogueMode::default(),
            sample_rate: defaults::SAMPLE_RATE,
            speech_threshold: defaults::SPEECH_THRESHOLD,
            segmenter: SegmenterConfig::default(),
        }
    }
}

/// Everything a session needs behind trait seams.
pub struct SessionBackends {
    pub source: Box<dyn AudioSource>,
    pub transcriber: Box<dyn Transcriber>,
    pub processor: TurnProcessor,
    pub synthesis: FallbackChain,
    pub playback: Box<dyn AudioPlayback>,
    /// Clock driving turn segmentation; swap for `MockClock` in tests.
    pub clock: Arc<dyn Clock>,
}

impl SessionBackends {
    fn providers(&self) -> Providers {
        Providers {
            transcription: self.transcriber.provider_name().to_string(),
            dialogue: self.processor.provider_name().to_string(),
            synthesis: self.synthesis.primary_provider().to_string(),
        }
    }
}

/// Flags shared between the controller and its threads.
struct Shared {
    /// Bumped on interrupt; utterances from older sequences are discarded.
    seq: AtomicU64,
    /// Capture thread records while set; cleared while the pipeline is busy.
    recording_enabled: AtomicBool,
    stopping: AtomicBool,
    /// Cancel token of the playback in flight, if any.
    cancel: Mutex<CancelToken>,
}

struct PendingUtterance {
    seq: u64,
    utterance: Utterance,
}

struct Threads {
    capture: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Orchestrates one conversation session.
pub struct SessionController {
    config: SessionConfig,
    bus: Arc<EventBus>,
    state: Arc<Mutex<SessionState>>,
    shared: Arc<Shared>,
    backends: Option<SessionBackends>,
    providers: Providers,
    threads: Option<Threads>,
}

impl SessionController {
    /// Build a controller on the given bus. The state container is
    /// registered as the first bus subscriber, so it is consistent with the
    /// event stream every later subscriber sees.
    pub fn new(config: SessionConfig, backends: SessionBackends, bus: Arc<EventBus>) -> Self {
        let state = Arc::new(Mutex::new(SessionState::new(config.mode)));
        {
            let state = Arc::clone(&state);
            bus.subscribe(move |event| {
                if let Ok(mut state) = state.lock() {
                    state.apply(event);
                }
            });
        }
        let providers = backends.providers();
        Self {
            config,
            bus,
            state,
            shared: Arc::new(Shared {
                seq: AtomicU64::new(0),
                recording_enabled: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                cancel: Mutex::new(CancelToken::new()),
            }),
            backends: Some(backends),
            providers,
            threads: None,
        }
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn is_running(&self) -> bool {
        self.threads.is_some()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Change the dialogue mode for subsequent turns.
    pub fn set_mode(&self, mode: DialogueMode) {
        if let Ok(mut state) = self.state.lock() {
            tracing::info!(from = %state.mode, to = %mode, "mode change");
            state.mode = mode;
        }
    }

    /// Open the session and begin listening.
    ///
    /// Idempotent: calling `start` on a running session logs and returns
    /// without publishing anything.
    pub fn start(&mut self) -> Result<()> {
        if self.threads.is_some() {
            tracing::info!(session = %self.config.session_id, "start ignored, already running");
            return Ok(());
        }
        let backends = self
            .backends
            .take()
            .ok_or_else(|| VoxloopError::InvalidTransition {
                message: "session already ended".to_string(),
            })?;

        // The only fatal acquisition: no device, no session.
        let capture = CaptureSession::open(backends.source, self.config.sample_rate)?;

        self.shared.stopping.store(false, Ordering::SeqCst);
        self.shared.recording_enabled.store(true, Ordering::SeqCst);
        self.bus.publish(EventKind::ConnectionOpen);

        let (tx, rx) = bounded::<PendingUtterance>(4);

        let capture_thread = {
            let bus = Arc::clone(&self.bus);
            let shared = Arc::clone(&self.shared);
            let config = self.config.clone();
            let segmenter = TurnSegmenter::with_clock(config.segmenter, backends.clock);
            std::thread::spawn(move || {
                run_capture_loop(capture, segmenter, &config, &bus, &shared, tx);
            })
        };

        let worker_thread = {
            let bus = Arc::clone(&self.bus);
            let shared = Arc::clone(&self.shared);
            let state = Arc::clone(&self.state);
            let transcriber = backends.transcriber;
            let processor = backends.processor;
            let synthesis = backends.synthesis;
            let playback = backends.playback;
            std::thread::spawn(move || {
                run_pipeline_worker(
                    rx, transcriber, processor, synthesis, playback, &bus, &state, &shared,
                );
            })
        };

        self.threads = Some(Threads {
            capture: capture_thread,
            worker: worker_thread,
        });
        tracing::info!(session = %self.config.session_id, "session started");
        Ok(())
    }

    /// Interrupt the response currently being spoken.
    ///
    /// Only valid while speaking; playback stops, the rest of the turn is
    /// discarded, and listening resumes immediately.
    pub fn interrupt(&self) -> Result<()> {
        let speaking = self
            .state
            .lock()
            .map(|state| state.is_speaking)
            .unwrap_or(false);
        if !speaking {
            return Err(VoxloopError::InvalidTransition {
                message: "interrupt is only valid while speaking".to_string(),
            });
        }

        self.shared.seq.fetch_add(1, Ordering::SeqCst);
        if let Ok(cancel) = self.shared.cancel.lock() {
            cancel.cancel();
        }
        self.bus.publish(EventKind::Interrupt);
        self.shared.recording_enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// End the session: flush any partial turn, release the device, and
    /// return the summary.
    pub fn stop(&mut self) -> Result<SessionSummary> {
        let threads = self
            .threads
            .take()
            .ok_or_else(|| VoxloopError::InvalidTransition {
                message: "session is not running".to_string(),
            })?;

        self.shared.stopping.store(true, Ordering::SeqCst);
        self.shared.recording_enabled.store(false, Ordering::SeqCst);
        if let Ok(cancel) = self.shared.cancel.lock() {
            cancel.cancel();
        }

        // Capture exits within one poll tick and flushes the partial
        // utterance; the worker drains the channel (transcribing the flush
        // so it lands as transcript_complete) and exits on disconnect.
        if threads.capture.join().is_err() {
            tracing::error!("capture thread panicked");
        }
        if threads.worker.join().is_err() {
            tracing::error!("pipeline worker panicked");
        }

        self.bus.publish(EventKind::ConnectionClose);

        let state = self.state();
        let summary =
            SessionSummary::from_state(&self.config.session_id, self.providers.clone(), &state);
        tracing::info!(
            session = %self.config.session_id,
            duration_ms = summary.duration_ms(),
            messages = summary.message_count(),
            total_cost = summary.total_cost,
            avg_latency_ms = ?summary.average_latency_ms(),
            "session ended"
        );
        Ok(summary)
    }
}

fn run_capture_loop<C: Clock>(
    mut capture: CaptureSession,
    mut segmenter: TurnSegmenter<C>,
    config: &SessionConfig,
    bus: &EventBus,
    shared: &Shared,
    tx: Sender<PendingUtterance>,
) {
    let poll = Duration::from_millis(config.segmenter.poll_interval_ms);
    let mut monitor = LevelMonitor::new(config.speech_threshold);

    while !shared.stopping.load(Ordering::SeqCst) {
        if shared.recording_enabled.load(Ordering::SeqCst) && !capture.is_recording() {
            capture.begin_recording();
            monitor.reset();
            segmenter.begin_turn();
            bus.publish(EventKind::MicStart);
        }

        if capture.is_recording() {
            match capture.poll_chunk() {
                Ok(chunk) => {
                    let level = monitor.feed(&chunk);
                    bus.publish(EventKind::AudioLevel {
                        amplitude: level.amplitude,
                        is_speech: level.is_speech,
                    });
                    // Only chunks that actually carried speech reset the
                    // silence timer; empty and sub-threshold reads leave it
                    // running. The same signal decides whether the finished
                    // turn is worth transcribing at all.
                    let heard_speech = !chunk.is_empty() && level.is_speech;
                    if heard_speech {
                        capture.note_speech();
                    }
                    segmenter.note_level(heard_speech);

                    if segmenter.should_end_turn() {
                        segmenter.end_turn();
                        shared.recording_enabled.store(false, Ordering::SeqCst);
                        bus.publish(EventKind::MicStop);
                        match capture.finish_recording() {
                            Some(utterance) => {
                                let seq = shared.seq.load(Ordering::SeqCst);
                                if tx.send(PendingUtterance { seq, utterance }).is_err() {
                                    break;
                                }
                            }
                            None => {
                                // Nothing captured; skip the pipeline and
                                // keep listening.
                                shared.recording_enabled.store(true, Ordering::SeqCst);
                            }
                        }
                    }
                }
                Err(error) => {
                    tracing::error!("audio capture failed: {}", error);
                    bus.publish(EventKind::Error {
                        stage: error.stage().unwrap_or(ErrorStage::Capture),
                        message: error.to_string(),
                    });
                    segmenter.end_turn();
                    let _ = capture.finish_recording();
                    shared.recording_enabled.store(false, Ordering::SeqCst);
                    bus.publish(EventKind::MicStop);
                }
            }
        }

        std::thread::sleep(poll);
    }

    // Stop requested mid-recording: flush what we have so it reaches the
    // transcript before the session closes.
    if capture.is_recording() {
        bus.publish(EventKind::MicStop);
        if let Some(utterance) = capture.finish_recording() {
            let seq = shared.seq.load(Ordering::SeqCst);
            let _ = tx.send(PendingUtterance { seq, utterance });
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_pipeline_worker(
    rx: Receiver<PendingUtterance>,
    transcriber: Box<dyn Transcriber>,
    processor: TurnProcessor,
    synthesis: FallbackChain,
    mut playback: Box<dyn AudioPlayback>,
    bus: &EventBus,
    state: &Mutex<SessionState>,
    shared: &Shared,
) {
    let resume_listening = || {
        if !shared.stopping.load(Ordering::SeqCst) {
            shared.recording_enabled.store(true, Ordering::SeqCst);
        }
    };
    let current_seq = || shared.seq.load(Ordering::SeqCst);
    let total_cost = |delta: f64| {
        state
            .lock()
            .map(|state| state.cost.total() + delta)
            .unwrap_or(delta)
    };

    for pending in rx.iter() {
        if pending.seq != current_seq() {
            tracing::debug!("discarding stale utterance");
            continue;
        }

        let transcript = match transcriber.transcribe(&pending.utterance) {
            Ok(transcript) => transcript,
            Err(error) => {
                match &error {
                    VoxloopError::Transcription {
                        failure: TranscriptionFailure::EmptyResult,
                    } => {
                        // No speech recognized; drop the turn quietly and
                        // keep the history clean.
                        tracing::debug!("empty transcription, resuming listening");
                    }
                    _ => {
                        tracing::warn!("transcription failed: {}", error);
                        bus.publish(EventKind::Error {
                            stage: ErrorStage::Transcription,
                            message: error.to_string(),
                        });
                    }
                }
                resume_listening();
                continue;
            }
        };

        // Snapshot mode and context before the transcript event appends the
        // new user message, so the dialogue request doesn't see its own
        // input in the history window.
        let (mode, history) = match state.lock() {
            Ok(state) => (state.mode, state.history.clone()),
            Err(_) => (DialogueMode::default(), Vec::new()),
        };

        bus.publish(EventKind::TranscriptComplete {
            text: transcript.text.clone(),
        });

        if shared.stopping.load(Ordering::SeqCst) {
            // Final flush: the transcript is recorded, nothing more to do.
            continue;
        }

        bus.publish(EventKind::ProcessingStart { mode });
        let turn = match processor.process(mode, &transcript.text, &history) {
            Ok(turn) => turn,
            Err(error) => {
                tracing::warn!("dialogue failed: {}", error);
                bus.publish(EventKind::Error {
                    stage: ErrorStage::Dialogue,
                    message: error.to_string(),
                });
                bus.publish(EventKind::ProcessingComplete {
                    response: String::new(),
                });
                resume_listening();
                continue;
            }
        };
        bus.publish(EventKind::ProcessingComplete {
            response: turn.response.clone(),
        });
        if turn.cost > 0.0 {
            bus.publish(EventKind::CostUpdate {
                stage: CostStage::Dialogue,
                delta: turn.cost,
                total: total_cost(turn.cost),
            });
        }

        if !turn.has_response() {
            resume_listening();
            continue;
        }
        if pending.seq != current_seq() || shared.stopping.load(Ordering::SeqCst) {
            continue;
        }

        bus.publish(EventKind::TtsStart {
            text: turn.response.clone(),
        });
        let outcome = match synthesis.synthesize(&turn.response) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!("synthesis failed: {}", error);
                bus.publish(EventKind::Error {
                    stage: ErrorStage::Synthesis,
                    message: format!("voice unavailable: {}", error),
                });
                resume_listening();
                continue;
            }
        };
        if let Some(reason) = &outcome.fallback_reason {
            bus.publish(EventKind::TtsFallback {
                reason: reason.clone(),
            });
        }
        bus.publish(EventKind::CostUpdate {
            stage: CostStage::Synthesis,
            delta: outcome.cost,
            total: total_cost(outcome.cost),
        });

        if pending.seq != current_seq() {
            resume_listening();
            continue;
        }

        let token = CancelToken::new();
        if let Ok(mut cancel) = shared.cancel.lock() {
            *cancel = token.clone();
        }
        bus.publish(EventKind::AudioStart);
        if let Err(error) = playback.play(&outcome.audio, &token) {
            tracing::warn!("playback failed: {}", error);
            bus.publish(EventKind::Error {
                stage: ErrorStage::Playback,
                message: error.to_string(),
            });
        }
        if pending.seq != current_seq() {
            // Interrupted mid-play: the interrupt event already marked the
            // transition, so no audio_end for this turn, and recording was
            // re-enabled by interrupt() itself.
            continue;
        }
        bus.publish(EventKind::AudioEnd);
        resume_listening();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MockAudioSource;
    use crate::dialogue::client::MockDialogueClient;
    use crate::dialogue::random::FixedRandom;
    use crate::segmenter::SystemClock;
    use crate::stt::transcriber::MockTranscriber;
    use crate::tts::chain::RetryPolicy;
    use crate::tts::playback::MockPlayback;
    use crate::tts::synthesizer::MockSynthesizer;

    /// Sleeper that never actually sleeps.
    struct NoSleep;
    impl crate::tts::Sleeper for NoSleep {
        fn sleep(&self, _: Duration) {}
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            session_id: "test".to_string(),
            mode: DialogueMode::Full,
            sample_rate: 16000,
            speech_threshold: 0.02,
            segmenter: SegmenterConfig {
                silence_threshold_ms: 40,
                poll_interval_ms: 2,
            },
        }
    }

    fn backends_with(
        source: MockAudioSource,
        transcriber: MockTranscriber,
        playback: MockPlayback,
    ) -> SessionBackends {
        SessionBackends {
            source: Box::new(source),
            transcriber: Box::new(transcriber),
            processor: TurnProcessor::new(
                Box::new(MockDialogueClient::new().with_response("a reply")),
                Box::new(FixedRandom(0)),
                None,
                None,
            ),
            synthesis: FallbackChain::with_policy(
                Box::new(MockSynthesizer::new("primary")),
                Box::new(MockSynthesizer::new("fallback")),
                RetryPolicy::default(),
                Box::new(NoSleep),
            ),
            playback: Box::new(playback),
            clock: Arc::new(SystemClock),
        }
    }

    fn speech_source() -> MockAudioSource {
        // A few loud chunks, then silence (empty reads) until the threshold.
        MockAudioSource::new().with_tone_chunks(3, 8000, 1600)
    }

    fn wait_until<F: Fn() -> bool>(deadline_ms: u64, predicate: F) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(deadline_ms) {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn test_start_is_idempotent() {
        let bus = Arc::new(EventBus::new());
        let rx = bus.tap();
        let mut controller = SessionController::new(
            fast_config(),
            backends_with(speech_source(), MockTranscriber::new(), MockPlayback::new()),
            bus,
        );

        controller.start().unwrap();
        controller.start().unwrap();
        controller.start().unwrap();

        // Let the first mic_start land, then count.
        assert!(wait_until(500, || {
            rx.try_iter()
                .filter(|e| matches!(e.kind, EventKind::MicStart))
                .count()
                >= 1
        }));
        let _ = controller.stop().unwrap();
    }

    #[test]
    fn test_start_fails_when_device_unavailable() {
        let bus = Arc::new(EventBus::new());
        let mut controller = SessionController::new(
            fast_config(),
            backends_with(
                MockAudioSource::new().with_start_failure(),
                MockTranscriber::new(),
                MockPlayback::new(),
            ),
            bus,
        );

        assert!(matches!(
            controller.start(),
            Err(VoxloopError::DeviceUnavailable { .. })
        ));
    }

    #[test]
    fn test_full_turn_reaches_playback() {
        let bus = Arc::new(EventBus::new());
        let playback = MockPlayback::new();
        let playback_handle = playback.clone();
        let mut controller = SessionController::new(
            fast_config(),
            backends_with(
                speech_source(),
                MockTranscriber::new().with_response("hello there"),
                playback,
            ),
            bus,
        );

        controller.start().unwrap();
        assert!(wait_until(2000, || playback_handle.play_count() >= 1));

        let summary = controller.stop().unwrap();
        assert_eq!(summary.transcript[0].text, "hello there");
        assert_eq!(summary.transcript[1].text, "a reply");
    }

    #[test]
    fn test_interrupt_requires_speaking() {
        let bus = Arc::new(EventBus::new());
        let mut controller = SessionController::new(
            fast_config(),
            backends_with(
                MockAudioSource::new(),
                MockTranscriber::new(),
                MockPlayback::new(),
            ),
            bus,
        );
        controller.start().unwrap();

        // Nothing is being spoken; interrupt must refuse.
        assert!(matches!(
            controller.interrupt(),
            Err(VoxloopError::InvalidTransition { .. })
        ));
        let _ = controller.stop().unwrap();
    }

    #[test]
    fn test_stop_without_start_errors() {
        let bus = Arc::new(EventBus::new());
        let mut controller = SessionController::new(
            fast_config(),
            backends_with(
                MockAudioSource::new(),
                MockTranscriber::new(),
                MockPlayback::new(),
            ),
            bus,
        );
        assert!(controller.stop().is_err());
    }

    #[test]
    fn test_stop_flushes_partial_transcript() {
        let bus = Arc::new(EventBus::new());
        let rx = bus.tap();
        // Endless speech: the silence threshold is never reached.
        let source = MockAudioSource::new().with_tone_chunks(10_000, 8000, 1600);
        let mut controller = SessionController::new(
            fast_config(),
            backends_with(
                source,
                MockTranscriber::new().with_response("partial words"),
                MockPlayback::new(),
            ),
            bus,
        );

        controller.start().unwrap();
        // Give the capture loop time to accumulate audio mid-turn.
        std::thread::sleep(Duration::from_millis(30));
        let summary = controller.stop().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert!(
            events
                .iter()
                .any(|e| matches!(&e.kind, EventKind::TranscriptComplete { text } if text == "partial words")),
            "flush should publish the partial transcript"
        );
        assert_eq!(summary.transcript.len(), 1, "flush is recorded, not answered");
    }

    #[test]
    fn test_set_mode_applies_to_state() {
        let bus = Arc::new(EventBus::new());
        let controller = SessionController::new(
            fast_config(),
            backends_with(
                MockAudioSource::new(),
                MockTranscriber::new(),
                MockPlayback::new(),
            ),
            bus,
        );
        controller.set_mode(DialogueMode::Scribe);
        assert_eq!(controller.state().mode, DialogueMode::Scribe);
    }
}
