//! Utterances — one contiguous span of caller speech
//!
//! An utterance accumulates transcript deltas while the caller speaks and
//! is sealed exactly once, either when the transcription service reports
//! end-of-utterance or when the VAD times out the trailing silence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::CallId;

/// Ordered accumulation of transcript deltas for one speech segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    call_id: CallId,
    turn_index: u32,
    partial_text: String,
    confidence: Option<f32>,
    started_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl Utterance {
    /// Start a new utterance for the given turn
    pub fn new(call_id: CallId, turn_index: u32) -> Self {
        Self {
            call_id,
            turn_index,
            partial_text: String::new(),
            confidence: None,
            started_at: Utc::now(),
            finalized_at: None,
        }
    }

    /// The call this utterance belongs to
    pub const fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Zero-based index of this turn within the call
    pub const fn turn_index(&self) -> u32 {
        self.turn_index
    }

    /// The transcript accumulated so far
    pub fn text(&self) -> &str {
        &self.partial_text
    }

    /// Transcription confidence of the latest delta, if reported
    pub const fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    /// When the caller started speaking
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the utterance has been sealed
    pub const fn is_final(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Append a transcript delta
    ///
    /// The partial text only ever grows; deltas from the transcription
    /// service replace the full partial when they are longer, which keeps
    /// the text monotonic even when the service rewrites earlier words.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UtteranceAlreadyFinal` if the utterance has
    /// been sealed.
    pub fn apply_delta(
        &mut self,
        text: &str,
        confidence: Option<f32>,
    ) -> Result<(), DomainError> {
        if self.is_final() {
            return Err(DomainError::UtteranceAlreadyFinal {
                turn_index: self.turn_index,
            });
        }
        if text.len() >= self.partial_text.len() {
            self.partial_text.clear();
            self.partial_text.push_str(text);
        } else {
            self.partial_text.push_str(text);
        }
        if confidence.is_some() {
            self.confidence = confidence;
        }
        Ok(())
    }

    /// Seal the utterance
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UtteranceAlreadyFinal` if called twice; an
    /// utterance becomes final exactly once.
    pub fn finalize(&mut self) -> Result<(), DomainError> {
        if self.is_final() {
            return Err(DomainError::UtteranceAlreadyFinal {
                turn_index: self.turn_index,
            });
        }
        self.finalized_at = Some(Utc::now());
        Ok(())
    }

    /// Approximate word count of the transcript so far
    pub fn word_count(&self) -> usize {
        self.partial_text.split_whitespace().count()
    }
}
