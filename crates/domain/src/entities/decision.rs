//! Model routing decisions
//!
//! One decision is computed per finalized utterance and never changes
//! mid-stream; re-evaluation happens only at the start of the next turn.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value_objects::ProcessingLocation;

/// Complexity bucket used to pick a generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// Caller-configured cost/quality preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostPriority {
    /// Always pick the most capable candidate
    QualityFirst,
    /// Weigh capability against cost
    #[default]
    Balanced,
    /// Prefer the cheapest candidate that fits the tier
    HighSavings,
}

impl fmt::Display for CostPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QualityFirst => write!(f, "quality_first"),
            Self::Balanced => write!(f, "balanced"),
            Self::HighSavings => write!(f, "high_savings"),
        }
    }
}

/// The routing decision for one conversational turn
///
/// Immutable for the turn it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelectionDecision {
    /// Identifier of the chosen generation backend
    pub backend_id: String,
    /// Where the backend call is dispatched
    pub processing_location: ProcessingLocation,
    /// Complexity tier the utterance was bucketed into
    pub tier: ComplexityTier,
    /// Whether extended reasoning is engaged for this turn
    pub extended_reasoning_enabled: bool,
    /// Token budget for reasoning content, when enabled
    pub reasoning_budget_tokens: Option<u32>,
    /// Human-readable rationale, recorded for observability
    pub rationale: String,
    /// True when every fit candidate was breaker-open and the turn fell
    /// through to the lowest tier's fastest backend
    pub degraded: bool,
}

impl ModelSelectionDecision {
    /// Shorthand used in log fields: `backend@location`
    pub fn target(&self) -> String {
        format!("{}@{}", self.backend_id, self.processing_location)
    }
}
