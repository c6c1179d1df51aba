//! Application errors and the closed stage-failure taxonomy
//!
//! Adapters return their own narrow errors; everything crossing into
//! the orchestrator is classified into exactly one of three buckets.
//! The orchestrator matches exhaustively: Transient gets the one
//! same-turn fallback, Degraded continues on a lesser backend, and
//! Permanent ends the turn with the spoken apology. The call itself is
//! never torn down because one turn degraded.

use ai_core::InferenceError;
use ai_speech::SpeechError;
use domain::CallId;
use infrastructure::CircuitBreakerError;
use thiserror::Error;

/// Classified failure of one pipeline stage
#[derive(Debug, Error)]
pub enum StageFailure {
    /// Worth one bounded retry or a same-turn fallback
    #[error("transient failure in {stage}: {reason}")]
    Transient {
        /// Stage that failed
        stage: &'static str,
        /// What happened
        reason: String,
    },

    /// Capacity is reduced (breaker open); continue on a lesser path
    #[error("degraded capacity in {stage}: {reason}")]
    Degraded {
        /// Stage that failed
        stage: &'static str,
        /// What happened
        reason: String,
    },

    /// Not retryable; the turn ends with the spoken apology
    #[error("permanent failure in {stage}: {reason}")]
    Permanent {
        /// Stage that failed
        stage: &'static str,
        /// What happened
        reason: String,
    },
}

impl StageFailure {
    /// Classify a speech adapter error
    pub fn from_speech(stage: &'static str, err: &SpeechError) -> Self {
        if err.is_transient() {
            Self::Transient {
                stage,
                reason: err.to_string(),
            }
        } else {
            Self::Permanent {
                stage,
                reason: err.to_string(),
            }
        }
    }

    /// Classify a generation adapter error
    pub fn from_inference(stage: &'static str, err: &InferenceError) -> Self {
        if err.is_transient() {
            Self::Transient {
                stage,
                reason: err.to_string(),
            }
        } else {
            Self::Permanent {
                stage,
                reason: err.to_string(),
            }
        }
    }

    /// Classify a breaker rejection
    pub fn from_breaker(stage: &'static str, err: &CircuitBreakerError) -> Self {
        Self::Degraded {
            stage,
            reason: err.to_string(),
        }
    }

    /// The stage this failure came from
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Transient { stage, .. }
            | Self::Degraded { stage, .. }
            | Self::Permanent { stage, .. } => stage,
        }
    }
}

/// Errors surfaced by the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A stage failed and the turn could not be salvaged
    #[error(transparent)]
    Stage(#[from] StageFailure),

    /// Operation referenced a call that is not active
    #[error("Call not found: {0}")]
    CallNotFound(CallId),

    /// Domain invariant violated
    #[error(transparent)]
    Domain(#[from] domain::DomainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_speech_errors_classify_transient() {
        let failure = StageFailure::from_speech("stt", &SpeechError::Timeout(50));
        assert!(matches!(failure, StageFailure::Transient { stage: "stt", .. }));
    }

    #[test]
    fn permanent_speech_errors_classify_permanent() {
        let failure =
            StageFailure::from_speech("stt", &SpeechError::InvalidAudio("bad".to_string()));
        assert!(matches!(failure, StageFailure::Permanent { .. }));
    }

    #[test]
    fn inter_token_timeout_classifies_transient() {
        let failure =
            StageFailure::from_inference("llm", &InferenceError::InterTokenTimeout(5000));
        assert!(matches!(failure, StageFailure::Transient { .. }));
    }

    #[test]
    fn auth_failure_classifies_permanent() {
        let failure =
            StageFailure::from_inference("llm", &InferenceError::AuthFailed("expired".to_string()));
        assert!(matches!(failure, StageFailure::Permanent { .. }));
    }

    #[test]
    fn breaker_rejection_classifies_degraded() {
        let err = CircuitBreakerError {
            service: "tts".to_string(),
            location: domain::ProcessingLocation::cloud("us-east"),
        };
        let failure = StageFailure::from_breaker("tts", &err);
        assert!(matches!(failure, StageFailure::Degraded { .. }));
        assert_eq!(failure.stage(), "tts");
    }

    #[test]
    fn failure_messages_name_the_stage() {
        let failure = StageFailure::from_speech("stt", &SpeechError::RateLimited);
        assert!(failure.to_string().contains("stt"));
    }
}
