//! voicepipe CLI
//!
//! Command-line interface for configuration checks and for driving a
//! simulated call against configured providers.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ai_core::{BackendCatalog, ModelRouter, RemoteGenerationGateway};
use ai_speech::providers::{HttpSpeechToText, HttpTextToSpeech};
use application::{CallManager, PipelineDeps};
use domain::{AudioFrame, CallId, CallerRegion, FrameEncoding, PipelineEvent, RegionProfile};
use infrastructure::{BreakerRegistry, LatencyProfiler, Settings, init_telemetry};

/// voicepipe CLI
#[derive(Parser)]
#[command(name = "voicepipe-cli")]
#[command(author, version, about = "Real-time voice pipeline CLI", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to voicepipe.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and print the effective configuration
    CheckConfig,

    /// Print the backend characteristics table the router scores from
    Backends,

    /// Run a simulated call from a raw μ-law audio file
    ///
    /// Reads 8 kHz μ-law audio, frames it at 20 ms, drives the full
    /// pipeline against the configured providers, and writes the
    /// synthesized response audio to the output file.
    Simulate {
        /// Raw μ-law input audio
        #[arg(short, long)]
        audio: PathBuf,

        /// Caller region code
        #[arg(short, long, default_value = "eu-central")]
        region: String,

        /// Where to write response audio
        #[arg(short, long, default_value = "response.raw")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings =
        Settings::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    init_telemetry(&settings.telemetry).context("failed to initialize telemetry")?;

    match cli.command {
        Commands::CheckConfig => check_config(&settings),
        Commands::Backends => backends(),
        Commands::Simulate {
            audio,
            region,
            output,
        } => simulate(settings, &audio, &region, &output).await,
    }
}

fn check_config(settings: &Settings) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(settings).context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

fn backends() -> Result<()> {
    let catalog = BackendCatalog::default();
    println!(
        "{:<12} {:>10} {:>16} {:>6} {:>10} {:>6}",
        "backend", "max tier", "first token ms", "cost", "reasoning", "edge"
    );
    for profile in catalog.profiles() {
        println!(
            "{:<12} {:>10} {:>16} {:>6.1} {:>10} {:>6}",
            profile.id,
            profile.max_tier.to_string(),
            profile.expected_first_token_ms,
            profile.relative_cost,
            profile.supports_reasoning,
            profile.edge_capable,
        );
    }
    Ok(())
}

async fn simulate(
    settings: Settings,
    audio_path: &PathBuf,
    region: &str,
    output: &PathBuf,
) -> Result<()> {
    let region = CallerRegion::new(region).context("invalid region code")?;
    let audio = std::fs::read(audio_path)
        .with_context(|| format!("failed to read {}", audio_path.display()))?;

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let breakers =
        Arc::new(BreakerRegistry::new(settings.breaker.clone()).with_events(events_tx.clone()));
    let profiler = Arc::new(LatencyProfiler::default().with_events(events_tx.clone()));

    let deps = PipelineDeps {
        stt: Arc::new(HttpSpeechToText::new(settings.stt.clone())?),
        tts: Arc::new(HttpTextToSpeech::new(settings.tts.clone())?),
        llm: Arc::new(RemoteGenerationGateway::new(settings.generation.clone())?),
        router: Arc::new(ModelRouter::new(
            BackendCatalog::default(),
            RegionProfile::default(),
        )),
        breakers,
        profiler,
    };
    let manager = CallManager::new(deps, settings, events_tx);

    let call_id = CallId::new();
    let mut handle = manager.start_call(call_id, region);
    println!("call {call_id} started, streaming {} bytes", audio.len());

    // Feed 20 ms μ-law frames in real time
    let feeder = handle.frames.clone();
    let feed = tokio::spawn(async move {
        for (sequence, payload) in audio.chunks(160).enumerate() {
            let frame = AudioFrame::new(
                payload.to_vec(),
                u64::try_from(sequence).unwrap_or(u64::MAX),
                chrono::Utc::now(),
                FrameEncoding::Mulaw8k,
            );
            let Ok(frame) = frame else { continue };
            if feeder.send(frame).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let mut response = Vec::new();
    loop {
        tokio::select! {
            maybe_chunk = handle.outbound.recv() => {
                match maybe_chunk {
                    Some(chunk) => {
                        println!(
                            "turn {} segment {}: {} bytes",
                            chunk.turn_index,
                            chunk.segment_index,
                            chunk.payload.len()
                        );
                        response.extend_from_slice(&chunk.payload);
                    },
                    None => break,
                }
            },
            Some(event) = events_rx.recv() => {
                print_event(&event);
            },
            () = tokio::time::sleep(Duration::from_secs(5)), if feed.is_finished() => {
                // Input drained and the pipeline has gone quiet
                break;
            },
        }
    }

    drop(handle.frames);
    manager.shutdown();

    std::fs::write(output, &response)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("wrote {} bytes to {}", response.len(), output.display());
    Ok(())
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::UtteranceFinalized { text, .. } => {
            println!("caller: {text}");
        },
        PipelineEvent::ModelSelected { decision, .. } => {
            println!(
                "routing: {} (tier {}, reasoning {})",
                decision.target(),
                decision.tier,
                decision.extended_reasoning_enabled
            );
        },
        PipelineEvent::TurnDegraded { reason, .. } => {
            println!("degraded: {reason}");
        },
        PipelineEvent::CircuitBreakerStateChanged {
            service,
            location,
            to,
            ..
        } => {
            println!("breaker: {service}@{location} -> {to}");
        },
        PipelineEvent::StageLatencyRecorded { .. } => {},
    }
}
