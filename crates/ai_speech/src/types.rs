//! Types shared by the speech ports and providers

use serde::{Deserialize, Serialize};

/// One partial or final transcription result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDelta {
    /// Transcript text for the utterance so far
    pub text: String,
    /// True exactly once per utterance, when the service seals it
    pub is_final: bool,
    /// Service-reported confidence (0.0 to 1.0), if available
    pub confidence: Option<f32>,
}

impl TranscriptDelta {
    /// A partial (non-final) delta
    pub fn partial(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            confidence,
        }
    }

    /// The final delta for an utterance
    pub fn final_result(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            confidence,
        }
    }
}

/// What arrives on the delta side of an STT stream
pub type SttEvent = Result<TranscriptDelta, crate::error::SpeechError>;
