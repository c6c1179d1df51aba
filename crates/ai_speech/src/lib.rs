//! Speech processing for voicepipe
//!
//! Front half of the pipeline: voice activity detection over companded
//! telephony audio, and the streaming speech-to-text / text-to-speech
//! ports with their HTTP providers.

pub mod config;
pub mod converter;
pub mod error;
pub mod ports;
pub mod providers;
pub mod types;
pub mod vad;

pub use config::{SttProviderConfig, TtsProviderConfig};
pub use error::SpeechError;
pub use ports::{SpeechToText, SttStream, SynthesisStream, TextToSpeech, TryPush};
pub use types::{SttEvent, TranscriptDelta};
pub use vad::{FrameClassification, VadConfig, VadEvent, VoiceActivityDetector, VoiceActivityState};
