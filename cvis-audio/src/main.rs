//! Companion Vision audio feedback (cvis-audio) - Main entry point
//!
//! Runs the detection → feedback pipeline on two pinned threads, optionally
//! plays a WAV prompt, and logs a status report until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cvis_audio::affinity::pin_current_thread;
use cvis_audio::audio::{AudioOutputWriter, AudioSink, NullSink, ToneSynthesizer, WavFileSink};
use cvis_audio::feedback::{DetectionQueue, FeedbackDispatcher};
use cvis_audio::playback::PlaybackEngine;
use cvis_audio::recognition::{run_producer, SyntheticCamera, TextRecognizer};
use cvis_audio::status::StatusReporter;
use cvis_audio::transport::{select_output_route, NoWirelessAudio};
use cvis_audio::AudioConfig;

/// Where synthesized and played audio ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Discard at real-time pace
    Null,
    /// Record to the WAV file given by --record
    Wav,
    /// Default audio device (needs the cpal-output feature)
    Cpal,
}

/// Command-line arguments for cvis-audio
#[derive(Parser, Debug)]
#[command(name = "cvis-audio")]
#[command(about = "Audio feedback pipeline for the Companion Vision wearable")]
#[command(version)]
struct Args {
    /// Config file path (overrides CVIS_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio output sink
    #[arg(long, value_enum, default_value = "null", env = "CVIS_SINK")]
    sink: SinkKind,

    /// Output file for the wav sink
    #[arg(long)]
    record: Option<PathBuf>,

    /// Output device name for the cpal sink (default device if unset)
    #[arg(long, env = "CVIS_DEVICE")]
    device: Option<String>,

    /// WAV file to play once the pipeline is up
    #[arg(long)]
    play: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cvis_audio=debug,cvis_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting cvis-audio v{} (git {}, {} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TARGET"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let config = AudioConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    info!("Configuration: {:?}", config);

    let route = select_output_route(&mut NoWirelessAudio).context("Wireless transport bring-up failed")?;

    let sink = build_sink(&args, &config)?;
    let output = Arc::new(AudioOutputWriter::new(sink));

    let engine = Arc::new(
        PlaybackEngine::new(Arc::clone(&output), &config).context("Failed to start playback engine")?,
    );
    let dispatcher = Arc::new(FeedbackDispatcher::new(ToneSynthesizer::new(
        Arc::clone(&output),
        config.tone_amplitude,
    )));
    let (sender, receiver) = DetectionQueue::new(config.queue_capacity);
    let queue_monitor = sender.monitor();
    let running = Arc::new(AtomicBool::new(true));

    // Consumer context: feedback dispatch
    let consumer = {
        let dispatcher = Arc::clone(&dispatcher);
        let core = config.consumer_core;
        std::thread::Builder::new()
            .name("feedback".to_string())
            .spawn(move || {
                pin_current_thread(core, "Feedback");
                dispatcher.run(receiver)
            })
            .context("Failed to spawn feedback thread")?
    };

    // Producer context: capture + recognition
    let producer = {
        let running = Arc::clone(&running);
        let core = config.producer_core;
        let interval = config.frame_interval();
        std::thread::Builder::new()
            .name("producer".to_string())
            .spawn(move || {
                pin_current_thread(core, "Producer");
                let mut camera = SyntheticCamera::new();
                let mut recognizer = TextRecognizer::new();
                // Sender moves in so the queue closes when the producer exits
                run_producer(&mut camera, &mut recognizer, &sender, interval, &running)
            })
            .context("Failed to spawn producer thread")?
    };

    if let Some(path) = args.play.clone() {
        let engine = Arc::clone(&engine);
        std::thread::Builder::new()
            .name("prompt".to_string())
            .spawn(move || {
                if let Err(e) = engine.play(&path) {
                    error!("Failed to play {}: {}", path.display(), e);
                }
            })
            .context("Failed to spawn prompt thread")?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = StatusReporter::new(
        route,
        queue_monitor,
        Arc::clone(&dispatcher),
        Arc::clone(&output),
        Arc::clone(&engine),
    );
    let status_task = tokio::spawn(reporter.run(config.status_interval(), shutdown_rx));

    info!("All components initialized, audio route: {}", route);
    shutdown_signal().await;

    running.store(false, Ordering::Relaxed);
    if let Err(e) = engine.stop() {
        warn!("Failed to stop playback: {}", e);
    }
    let _ = shutdown_tx.send(true);

    let joined = tokio::task::spawn_blocking(move || (producer.join(), consumer.join()))
        .await
        .context("Failed to join pipeline threads")?;
    match joined {
        (Ok(Ok(queued)), Ok(handled)) => {
            info!("Pipeline stopped: {} results queued, {} handled", queued, handled)
        }
        (Ok(Err(e)), _) => warn!("Producer stopped with error: {}", e),
        _ => warn!("A pipeline thread panicked"),
    }

    if let Err(e) = status_task.await {
        warn!("Status reporter task failed: {}", e);
    }
    engine.shutdown();

    info!("Shutdown complete");
    Ok(())
}

fn build_sink(args: &Args, config: &AudioConfig) -> Result<Box<dyn AudioSink>> {
    let rate = config.output_sample_rate;
    match args.sink {
        SinkKind::Null => Ok(Box::new(NullSink::paced(rate))),
        SinkKind::Wav => {
            let Some(path) = args.record.as_deref() else {
                bail!("--sink wav needs --record <path>");
            };
            let sink = WavFileSink::create(path, rate)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(sink))
        }
        SinkKind::Cpal => open_device(args.device.as_deref(), rate),
    }
}

#[cfg(feature = "cpal-output")]
fn open_device(name: Option<&str>, sample_rate: u32) -> Result<Box<dyn AudioSink>> {
    let sink = cvis_audio::audio::CpalSink::open(name, sample_rate).context("Failed to open audio device")?;
    Ok(Box::new(sink))
}

#[cfg(not(feature = "cpal-output"))]
fn open_device(_name: Option<&str>, _sample_rate: u32) -> Result<Box<dyn AudioSink>> {
    bail!("built without the cpal-output feature; use --sink null or --sink wav")
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
