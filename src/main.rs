use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use parley::voice::{
    AudioCapture, AudioFormat, AudioPlayback, SpeechToText, TextToSpeech, rms_energy,
};
use parley::{Assistant, Config, LlmClient};

/// Parley - offline voice assistant over local STT, LLM, and TTS servers
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Report readiness of the STT, LLM, and TTS services
    Check,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Check => check_services().await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    // Load configuration
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    tracing::info!(
        assistant = %config.assistant_name,
        model = %config.llm.model,
        "starting assistant"
    );

    // Ctrl-c requests a stop checked between loop phases
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    // Run the loop on the main thread (cpal streams aren't Send)
    let mut assistant = Assistant::new(config)?;
    assistant.run(&mut shutdown_rx).await?;

    Ok(())
}

/// Report readiness of the three local inference services
async fn check_services() -> anyhow::Result<()> {
    let config = Config::load()?;
    let mut all_ready = true;

    println!("Checking local services...\n");

    let stt = SpeechToText::new(&config.services.stt_url, &config.voice.stt_model)?;
    match stt.ready().await {
        Ok(()) => println!("  STT  {} ... ok", config.services.stt_url),
        Err(e) => {
            println!("  STT  {} ... UNAVAILABLE ({e})", config.services.stt_url);
            all_ready = false;
        }
    }

    let llm = LlmClient::new(&config.services.llm_url, &config.llm)?;
    match llm.ready().await {
        Ok(models) => {
            println!("  LLM  {} ... ok", config.services.llm_url);
            if models.iter().any(|m| *m == config.llm.model) {
                println!("       model {} is available", config.llm.model);
            } else {
                println!(
                    "       WARNING: configured model {} not in server list ({})",
                    config.llm.model,
                    models.join(", ")
                );
            }
        }
        Err(e) => {
            println!("  LLM  {} ... UNAVAILABLE ({e})", config.services.llm_url);
            all_ready = false;
        }
    }

    let tts = TextToSpeech::new(&config.services.tts_url, &config.voice.tts_engine)?;
    match tts.ready().await {
        Ok(()) => println!("  TTS  {} ... ok", config.services.tts_url),
        Err(e) => {
            println!("  TTS  {} ... UNAVAILABLE ({e})", config.services.tts_url);
            all_ready = false;
        }
    }

    // Audio devices are fatal when missing, so report them here too
    match AudioCapture::new() {
        Ok(capture) => println!("  mic  {} ... ok", capture.device_name()),
        Err(e) => {
            println!("  mic  ... UNAVAILABLE ({e})");
            all_ready = false;
        }
    }
    match AudioPlayback::new() {
        Ok(playback) => println!("  out  {} ... ok", playback.device_name()),
        Err(e) => {
            println!("  out  ... UNAVAILABLE ({e})");
            all_ready = false;
        }
    }

    println!();
    if all_ready {
        println!("All services ready. Run `parley` to start.");
        Ok(())
    } else {
        anyhow::bail!("one or more services are not ready");
    }
}

/// Meter the microphone for a few seconds
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!(
        "Metering {} at {} Hz for {duration}s. Say something!\n",
        capture.device_name(),
        parley::config::SAMPLE_RATE
    );

    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Drain one second of samples per row
        let samples = capture.take_buffer();
        let energy = rms_energy(&samples);
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = (energy * 100.0).min(40.0) as usize;
        println!(
            "[{second:2}s] rms {energy:.4}  peak {peak:.4}  |{:<40}|",
            "#".repeat(width)
        );
    }

    capture.stop();

    println!("\nA flat meter usually means the wrong default source.");
    println!("Check `pactl info` and `arecord -l` for the device in use.");
    Ok(())
}

/// Play a short tone through the default output device
async fn test_speaker() -> anyhow::Result<()> {
    let mut playback = AudioPlayback::new()?;
    println!(
        "Playing a 440 Hz tone on {} for 2 seconds...",
        playback.device_name()
    );

    let rate = 24_000_u32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..rate * 2)
        .map(|i| {
            let t = i as f32 / rate as f32;
            (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.3
        })
        .collect();

    playback.play(samples, rate).await?;

    println!("\nNo tone? Check the default sink with `pactl list sinks short`.");
    Ok(())
}

/// Test TTS output against the local synthesis server
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::new(&config.services.tts_url, &config.voice.tts_engine)?;
    let voice = parley::config::VOICE_PRESETS[config.voice.tts_voice_index];

    println!("Synthesizing speech (voice {voice})...");
    let audio = tts
        .synthesize(text, voice)
        .await
        .map_err(|e| anyhow::anyhow!("TTS synthesis failed: {e}"))?;
    println!("Got {} bytes of audio data", audio.data.len());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    match audio.format {
        AudioFormat::Wav => playback.play_wav(&audio.data).await?,
        AudioFormat::Mp3 => playback.play_mp3(&audio.data).await?,
    }

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
