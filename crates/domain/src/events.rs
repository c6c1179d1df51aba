//! Events the pipeline emits to analytics/observability collaborators
//!
//! Emitted over an unbounded channel per call; consumers outside the
//! pipeline forward them to whatever sink they like. Losing a consumer
//! never blocks the pipeline.

use serde::{Deserialize, Serialize};

use crate::entities::ModelSelectionDecision;
use crate::value_objects::{CallId, CircuitState, ProcessingLocation};

/// Outbound pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// An utterance was sealed and handed to the router
    UtteranceFinalized {
        call_id: CallId,
        turn_index: u32,
        text: String,
        confidence: Option<f32>,
    },

    /// A backend/location decision was made for a turn
    ModelSelected {
        call_id: CallId,
        turn_index: u32,
        decision: ModelSelectionDecision,
    },

    /// A stage invocation was timed
    StageLatencyRecorded {
        call_id: CallId,
        stage: String,
        duration_ms: u64,
    },

    /// A (service, location) breaker changed state
    CircuitBreakerStateChanged {
        service: String,
        location: ProcessingLocation,
        from: CircuitState,
        to: CircuitState,
    },

    /// A turn completed in degraded mode (fallback backend or apology)
    TurnDegraded {
        call_id: CallId,
        turn_index: u32,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = PipelineEvent::StageLatencyRecorded {
            call_id: CallId::new(),
            stage: "tts.first_audio".to_string(),
            duration_ms: 48,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"stage_latency_recorded""#));
        assert!(json.contains("tts.first_audio"));
    }

    #[test]
    fn breaker_event_carries_both_states() {
        let event = PipelineEvent::CircuitBreakerStateChanged {
            service: "generation".to_string(),
            location: ProcessingLocation::cloud("us-east"),
            from: CircuitState::Closed,
            to: CircuitState::Open,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""from":"closed""#));
        assert!(json.contains(r#""to":"open""#));
    }
}
