//! Layered configuration for the pipeline
//!
//! Defaults < optional TOML file < `VOICEPIPE_*` environment overrides.
//! Every recognized option has a serde default so a missing file means
//! a fully working default configuration.

use ai_core::{GenerationConfig, RouterPolicy};
use ai_speech::{SttProviderConfig, TtsProviderConfig, VadConfig};
use serde::{Deserialize, Serialize};

use crate::adapters::BreakerConfig;
use crate::error::InfrastructureError;
use crate::retry::RetryConfig;
use crate::telemetry::TelemetryConfig;

/// What the frame buffer does when it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest buffered frame to make room
    DropOldest,
    /// Block the producer for a short grace period, then drop the new
    /// frame if space never opens up
    BlockProducer {
        /// How long to wait for space, in milliseconds
        grace_ms: u64,
    },
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::DropOldest
    }
}

/// Frame buffer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSettings {
    /// Maximum buffered frames per call
    #[serde(default = "default_capacity_frames")]
    pub capacity_frames: usize,

    /// Overflow policy; explicit and observable, never silent
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

const fn default_capacity_frames() -> usize {
    100
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            capacity_frames: default_capacity_frames(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Complete pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Router policy: latency target, cost priority, reasoning budget
    #[serde(default)]
    pub router: RouterPolicy,

    /// Voice activity detection parameters
    #[serde(default)]
    pub vad: VadConfig,

    /// Frame buffer capacity and overflow policy
    #[serde(default)]
    pub buffer: BufferSettings,

    /// Circuit breaker thresholds
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Adapter-level retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Transcription provider
    #[serde(default)]
    pub stt: SttProviderConfig,

    /// Synthesis provider
    #[serde(default)]
    pub tts: TtsProviderConfig,

    /// Generation gateway
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Telemetry initialization
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Spoken when a turn fails despite fallback
    #[serde(default = "default_apology_phrase")]
    pub apology_phrase: String,
}

fn default_apology_phrase() -> String {
    "I'm sorry, I'm having trouble right now. Could you say that again?".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            router: RouterPolicy::default(),
            vad: VadConfig::default(),
            buffer: BufferSettings::default(),
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            stt: SttProviderConfig::default(),
            tts: TtsProviderConfig::default(),
            generation: GenerationConfig::default(),
            telemetry: TelemetryConfig::default(),
            apology_phrase: default_apology_phrase(),
        }
    }
}

impl Settings {
    /// Load from the default sources
    ///
    /// Reads `voicepipe.toml` from the working directory when present,
    /// then applies `VOICEPIPE_*` environment overrides (for example
    /// `VOICEPIPE_ROUTER__LATENCY_TARGET_MS=500`).
    pub fn load() -> Result<Self, InfrastructureError> {
        Self::load_from(None)
    }

    /// Load from an explicit file plus environment overrides
    pub fn load_from(path: Option<&str>) -> Result<Self, InfrastructureError> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("voicepipe").required(false)),
        };

        let loaded = builder
            .add_source(
                config::Environment::with_prefix("VOICEPIPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Self = loaded.try_deserialize()?;
        if settings.apology_phrase.is_empty() {
            settings.apology_phrase = default_apology_phrase();
        }
        Ok(settings)
    }
}
