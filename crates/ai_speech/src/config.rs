//! Configuration for the speech providers

use serde::{Deserialize, Serialize};

/// Configuration for the streaming STT provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttProviderConfig {
    /// Base URL of the transcription service
    #[serde(default = "default_stt_base_url")]
    pub base_url: String,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Maximum reconnection attempts before surfacing
    /// `TranscriptionUnavailable`
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Initial reconnect delay in milliseconds (doubles per attempt)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Number of recent frames kept for replay after a reconnect
    #[serde(default = "default_replay_frames")]
    pub replay_frames: usize,

    /// Model identifier sent to the service
    #[serde(default = "default_stt_model")]
    pub model: String,
}

fn default_stt_base_url() -> String {
    "http://localhost:8710".to_string()
}

const fn default_connect_timeout_ms() -> u64 {
    2000
}

const fn default_max_reconnect_attempts() -> u32 {
    3
}

const fn default_reconnect_delay_ms() -> u64 {
    100
}

const fn default_replay_frames() -> usize {
    50
}

fn default_stt_model() -> String {
    "streaming-asr-1".to_string()
}

impl Default for SttProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_stt_base_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            replay_frames: default_replay_frames(),
            model: default_stt_model(),
        }
    }
}

/// Configuration for the streaming TTS provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsProviderConfig {
    /// Base URL of the synthesis service
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds (whole-segment synthesis)
    #[serde(default = "default_tts_timeout_ms")]
    pub timeout_ms: u64,

    /// Voice identifier
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Model identifier sent to the service
    #[serde(default = "default_tts_model")]
    pub model: String,
}

fn default_tts_base_url() -> String {
    "http://localhost:8720".to_string()
}

const fn default_tts_timeout_ms() -> u64 {
    10_000
}

fn default_voice() -> String {
    "neutral-1".to_string()
}

fn default_tts_model() -> String {
    "streaming-tts-1".to_string()
}

impl Default for TtsProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            timeout_ms: default_tts_timeout_ms(),
            voice: default_voice(),
            model: default_tts_model(),
        }
    }
}
