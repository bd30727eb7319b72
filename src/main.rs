use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use voxloop::config::Config;
use voxloop::dialogue::{
    DialogueMode, HttpDialogueClient, SystemRandom, TurnProcessor,
    client::HttpDialogueClientConfig,
};
use voxloop::segmenter::{SegmenterConfig, SystemClock};
use voxloop::session::{SessionBackends, SessionConfig, SessionController};
use voxloop::stt::{HttpTranscriber, remote::HttpTranscriberConfig};
use voxloop::tts::{
    CommandSynthesizer, CommandPlayback, FallbackChain, HttpSynthesizer, HttpSynthesizerConfig,
};
use voxloop::bus::{EventBus, EventKind};

/// Real-time voice conversation sessions from the terminal.
#[derive(Parser, Debug)]
#[command(name = "voxloop", version = voxloop::version_string(), about)]
struct Cli {
    /// Path to a config file (defaults to ~/.config/voxloop/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio input device name (defaults to the system default)
    #[arg(short, long)]
    device: Option<String>,

    /// Dialogue mode: scribe, active, or full
    #[arg(short, long)]
    mode: Option<String>,

    /// Synthesis voice: alloy, echo, fable, onyx, nova, or shimmer
    #[arg(long)]
    voice: Option<String>,

    /// Session identifier used in the summary
    #[arg(long, default_value = "default")]
    session: String,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let mode = config.session.mode;

    let mut controller = build_controller(&cli, &config)?;
    let bus = controller.bus();
    spawn_event_printer(&bus);

    controller.start()?;
    eprintln!(
        "voxloop {} — mode {}. Speak after the prompt; press Enter to end, type 'i' to interrupt.",
        voxloop::version_string(),
        mode
    );

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" | "quit" | "exit" => break,
            "i" | "interrupt" => {
                if let Err(e) = controller.interrupt() {
                    eprintln!("{}", e);
                }
            }
            command => {
                if let Some(mode) = command.strip_prefix("mode ") {
                    match mode.parse::<DialogueMode>() {
                        Ok(mode) => controller.set_mode(mode),
                        Err(e) => eprintln!("{}", e),
                    }
                } else {
                    eprintln!("commands: Enter (end), i (interrupt), mode <scribe|active|full>");
                }
            }
        }
    }

    let summary = controller.stop()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "voxloop=info",
        1 => "voxloop=debug",
        _ => "voxloop=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration, applying environment and CLI overrides.
///
/// Priority order:
/// 1. CLI flags (--device, --mode, --voice)
/// 2. VOXLOOP_* environment variables
/// 3. Config file (--config, or the default path)
/// 4. Built-in defaults
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else if let Some(path) = Config::default_path() {
        Config::load_or_default(&path)?
    } else {
        Config::default()
    }
    .with_env_overrides();

    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(mode) = &cli.mode {
        config.session.mode = mode.parse()?;
    }
    if let Some(voice) = &cli.voice {
        config.tts.voice = voice.parse()?;
    }
    config.validate()?;
    Ok(config)
}

fn build_controller(cli: &Cli, config: &Config) -> Result<SessionController> {
    let api_key_hint = "set it in the config file or via VOXLOOP_API_KEY";

    let transcriber = HttpTranscriber::new(HttpTranscriberConfig {
        base_url: config.stt.base_url.clone(),
        api_key: config
            .stt
            .api_key
            .clone()
            .with_context(|| format!("stt.api_key is missing; {}", api_key_hint))?,
        model: config.stt.model.clone(),
        timeout: Duration::from_secs(config.stt.timeout_secs),
    })?;

    let dialogue = HttpDialogueClient::new(HttpDialogueClientConfig {
        base_url: config.dialogue.base_url.clone(),
        api_key: config
            .dialogue
            .api_key
            .clone()
            .with_context(|| format!("dialogue.api_key is missing; {}", api_key_hint))?,
        model: config.dialogue.model.clone(),
        timeout: Duration::from_secs(config.dialogue.timeout_secs),
    })?;

    let synthesizer = HttpSynthesizer::new(HttpSynthesizerConfig {
        base_url: config.tts.base_url.clone(),
        api_key: config
            .tts
            .api_key
            .clone()
            .with_context(|| format!("tts.api_key is missing; {}", api_key_hint))?,
        model: config.tts.model.clone(),
        voice: config.tts.voice,
        speed: config.tts.speed,
        timeout: Duration::from_secs(config.tts.timeout_secs),
    })?;

    let processor = TurnProcessor::new(
        Box::new(dialogue),
        Box::new(SystemRandom),
        config.dialogue.system_instructions.clone(),
        config.dialogue.user_id.clone(),
    );
    let synthesis = FallbackChain::new(
        Box::new(synthesizer),
        Box::new(CommandSynthesizer::new(&config.tts.fallback_command)),
    );
    let player_args: Vec<&str> = config.tts.player_args.iter().map(String::as_str).collect();
    let playback = CommandPlayback::new(&config.tts.player).with_args(&player_args);

    let backends = SessionBackends {
        source: open_source(config)?,
        transcriber: Box::new(transcriber),
        processor,
        synthesis,
        playback: Box::new(playback),
        clock: Arc::new(SystemClock),
    };

    let session_config = SessionConfig {
        session_id: cli.session.clone(),
        mode: config.session.mode,
        sample_rate: config.audio.sample_rate,
        speech_threshold: config.audio.speech_threshold,
        segmenter: SegmenterConfig {
            silence_threshold_ms: config.segmenter.silence_threshold_ms,
            poll_interval_ms: config.segmenter.poll_interval_ms,
        },
    };

    Ok(SessionController::new(
        session_config,
        backends,
        Arc::new(EventBus::new()),
    ))
}

#[cfg(feature = "cpal-audio")]
fn open_source(config: &Config) -> Result<Box<dyn voxloop::AudioSource>> {
    let source = voxloop::audio::cpal_source::CpalAudioSource::new(config.audio.device.as_deref())?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "cpal-audio"))]
fn open_source(_config: &Config) -> Result<Box<dyn voxloop::AudioSource>> {
    anyhow::bail!("this build has no microphone support; rebuild with the cpal-audio feature");
}

/// Print the conversation as it happens, from a bus tap.
fn spawn_event_printer(bus: &EventBus) {
    let rx = bus.tap();
    std::thread::spawn(move || {
        for event in rx.iter() {
            match &event.kind {
                EventKind::MicStart => eprintln!("[listening]"),
                EventKind::TranscriptComplete { text } => println!("you: {}", text),
                EventKind::ProcessingComplete { response } if !response.is_empty() => {
                    println!("voxloop: {}", response);
                }
                EventKind::TtsFallback { reason } => {
                    eprintln!("[voice degraded to local synthesis: {}]", reason);
                }
                EventKind::CostUpdate { total, .. } => {
                    tracing::debug!(total = *total, "session cost");
                }
                EventKind::Error { stage, message } => {
                    eprintln!("[{} error: {}]", stage, message);
                }
                EventKind::Interrupt => eprintln!("[interrupted]"),
                _ => {}
            }
        }
    });
}
