//! Port definitions for generation backends

use std::pin::Pin;

use async_trait::async_trait;
use domain::ModelSelectionDecision;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// A message in the prompt context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceMessage {
    pub role: String,
    pub content: String,
}

impl InferenceMessage {
    /// A user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// An assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// A system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Request for one turn's generation stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Conversation context, oldest first
    pub messages: Vec<InferenceMessage>,
    /// The routing decision driving this request
    pub decision: ModelSelectionDecision,
}

impl GenerationRequest {
    /// Create a request from a single user utterance
    pub fn from_utterance(text: impl Into<String>, decision: ModelSelectionDecision) -> Self {
        Self {
            messages: vec![InferenceMessage::user(text)],
            decision,
        }
    }

    /// Prepend a system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.messages.insert(0, InferenceMessage::system(system));
        self
    }
}

/// One delta from a generation stream
///
/// When extended reasoning is engaged the stream interleaves reasoning
/// and answer deltas. Only answer deltas may reach synthesis; reasoning
/// deltas are recorded for telemetry and never spoken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "content", rename_all = "snake_case")]
pub enum GenerationDelta {
    /// Intermediate reasoning content (telemetry only)
    Reasoning(String),
    /// Answer content (forwarded to the segmenter)
    Answer(String),
    /// Explicit end-of-turn marker
    Done,
}

impl GenerationDelta {
    /// True for the end-of-turn marker
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Type alias for a generation delta stream
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<GenerationDelta, InferenceError>> + Send>>;

/// Port for generation backend implementations
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Open a delta stream for one turn
    ///
    /// The stream terminates with [`GenerationDelta::Done`] or an error.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` when the stream cannot be established.
    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream, InferenceError>;

    /// Check if the generation service is reachable
    async fn health_check(&self) -> Result<bool, InferenceError>;

    /// Name of this gateway/engine
    fn name(&self) -> &str;
}
