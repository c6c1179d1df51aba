//! Adaptive model routing
//!
//! One decision per finalized utterance: estimate complexity, pick a
//! tier from the caller's latency target and cost priority, walk the
//! tier's candidate backends and region-preferred locations skipping
//! breaker-open pairs, and size the reasoning budget when engaged.
//!
//! The router is a pure scoring function over the backend table, the
//! region profile, and a health view; it performs no I/O, which is what
//! makes the selection logic testable in isolation.

use aho_corasick::AhoCorasick;
use domain::{
    CallerRegion, ComplexityTier, CostPriority, ModelSelectionDecision, ProcessingLocation,
    RegionProfile, Utterance,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backends::{BackendCatalog, BackendProfile};

/// Service name generation breakers are keyed under
pub const GENERATION_SERVICE: &str = "generation";

/// Lexical markers that indicate a reasoning-heavy request
const REASONING_MARKERS: &[&str] = &[
    "analyze",
    "analyse",
    "compare",
    "explain why",
    "explain how",
    "troubleshoot",
    "diagnose",
    "walk me through",
    "step by step",
    "pros and cons",
    "trade-off",
    "tradeoff",
    "calculate",
    "debug",
];

/// Minimum reasoning budget when extended reasoning is engaged
const MIN_REASONING_BUDGET: u32 = 1024;

/// View of breaker health the router consults
///
/// Implemented by the infrastructure breaker registry; the trait keeps
/// this crate free of the registry itself.
pub trait ServiceHealth {
    /// Whether the breaker for (service, location) is currently open
    fn is_open(&self, service: &str, location: &ProcessingLocation) -> bool;
}

/// Health view that reports everything healthy
///
/// Useful in tests and for callers without a breaker registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBreakers;

impl ServiceHealth for NoBreakers {
    fn is_open(&self, _service: &str, _location: &ProcessingLocation) -> bool {
        false
    }
}

/// Caller-level routing policy, fixed for the duration of a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterPolicy {
    /// Target end-to-end latency in milliseconds
    #[serde(default = "default_latency_target_ms")]
    pub latency_target_ms: u64,

    /// Cost/quality preference
    #[serde(default)]
    pub cost_priority: CostPriority,

    /// Whether extended reasoning may ever be engaged
    #[serde(default = "default_true")]
    pub extended_reasoning_allowed: bool,

    /// Upper bound for the reasoning token budget
    #[serde(default = "default_max_reasoning_budget")]
    pub max_reasoning_budget_tokens: u32,
}

const fn default_latency_target_ms() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

const fn default_max_reasoning_budget() -> u32 {
    32_768
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            latency_target_ms: default_latency_target_ms(),
            cost_priority: CostPriority::default(),
            extended_reasoning_allowed: default_true(),
            max_reasoning_budget_tokens: default_max_reasoning_budget(),
        }
    }
}

impl RouterPolicy {
    /// A latency target loose enough to absorb reasoning overhead
    ///
    /// Reasoning adds 500-2000 ms before the first answer token; below
    /// this target it is never worth engaging.
    const fn tolerates_reasoning(&self) -> bool {
        self.latency_target_ms >= 500
    }
}

/// Per-call context the router needs
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Where the caller's audio enters the system
    pub region: CallerRegion,
    /// Completed turns so far in this call
    pub turns_so_far: u32,
}

/// The adaptive model router
#[derive(Debug)]
pub struct ModelRouter {
    catalog: BackendCatalog,
    regions: RegionProfile,
    markers: AhoCorasick,
}

impl ModelRouter {
    /// Create a router over a backend catalog and region profile
    ///
    /// # Panics
    ///
    /// Never panics: the marker set is a compile-time constant that is
    /// known to build.
    pub fn new(catalog: BackendCatalog, regions: RegionProfile) -> Self {
        #[allow(clippy::expect_used)]
        let markers = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(REASONING_MARKERS)
            .expect("static marker set builds");
        Self {
            catalog,
            regions,
            markers,
        }
    }

    /// The backend catalog this router scores from
    pub const fn catalog(&self) -> &BackendCatalog {
        &self.catalog
    }

    /// Estimate the complexity tier of an utterance
    ///
    /// Three signals: transcript length, reasoning-trigger markers, and
    /// conversation depth. Deep conversations get a small bump because
    /// accumulated context makes follow-ups harder.
    pub fn estimate_tier(&self, utterance: &Utterance, context: &CallContext) -> ComplexityTier {
        let words = utterance.word_count();
        let has_marker = self.markers.is_match(utterance.text());
        let deep_conversation = context.turns_so_far >= 6;

        let mut score = 0u32;
        score += match words {
            0..=8 => 0,
            9..=25 => 1,
            26..=60 => 2,
            _ => 3,
        };
        if has_marker {
            score += 2;
        }
        if deep_conversation {
            score += 1;
        }

        match score {
            0 => ComplexityTier::Low,
            1 => ComplexityTier::Medium,
            2 | 3 => ComplexityTier::High,
            _ => ComplexityTier::VeryHigh,
        }
    }

    /// Select a backend and location for one finalized utterance
    ///
    /// Computed once per turn; the decision is immutable until the next
    /// turn starts.
    pub fn select(
        &self,
        utterance: &Utterance,
        context: &CallContext,
        policy: &RouterPolicy,
        health: &dyn ServiceHealth,
    ) -> ModelSelectionDecision {
        let mut tier = self.estimate_tier(utterance, context);

        // A tight latency target caps the tier: no point routing a
        // complex utterance to a slow backend the budget cannot afford.
        if policy.latency_target_ms < 200 && tier > ComplexityTier::Medium {
            debug!(
                latency_target_ms = policy.latency_target_ms,
                estimated = %tier,
                "Latency target caps complexity tier"
            );
            tier = ComplexityTier::Medium;
        }

        let locations = self.regions.candidates_for(&context.region);

        for profile in self.catalog.candidates_for(tier, policy.cost_priority) {
            if let Some(location) = first_healthy_location(profile, locations, health) {
                let (reasoning, budget) = reasoning_for(profile, tier, policy);
                let rationale = format!(
                    "tier={tier} words={} priority={} reasoning={reasoning}",
                    utterance.word_count(),
                    policy.cost_priority,
                );
                return ModelSelectionDecision {
                    backend_id: profile.id.clone(),
                    processing_location: location,
                    tier,
                    extended_reasoning_enabled: reasoning,
                    reasoning_budget_tokens: budget,
                    rationale,
                    degraded: false,
                };
            }
        }

        // Every fit candidate is breaker-open: degrade to the fastest
        // backend in the table regardless of fit and flag the turn.
        warn!(tier = %tier, "All candidates open, degrading turn");
        self.degraded_decision(tier, locations)
    }

    fn degraded_decision(
        &self,
        tier: ComplexityTier,
        locations: &[ProcessingLocation],
    ) -> ModelSelectionDecision {
        let fallback_location = locations
            .last()
            .cloned()
            .unwrap_or_else(|| ProcessingLocation::cloud("us-east"));
        let backend_id = self
            .catalog
            .fastest()
            .map_or_else(|| "sprint-1".to_string(), |p| p.id.clone());
        ModelSelectionDecision {
            backend_id,
            processing_location: fallback_location,
            tier,
            extended_reasoning_enabled: false,
            reasoning_budget_tokens: None,
            rationale: format!("degraded: all candidates open for tier={tier}"),
            degraded: true,
        }
    }
}

/// The region-preferred location whose breaker is not open
fn first_healthy_location(
    profile: &BackendProfile,
    locations: &[ProcessingLocation],
    health: &dyn ServiceHealth,
) -> Option<ProcessingLocation> {
    locations
        .iter()
        .filter(|loc| profile.edge_capable || loc.kind() == domain::LocationKind::Cloud)
        .find(|loc| !health.is_open(GENERATION_SERVICE, loc))
        .cloned()
}

/// Whether to engage reasoning, and with what budget
fn reasoning_for(
    profile: &BackendProfile,
    tier: ComplexityTier,
    policy: &RouterPolicy,
) -> (bool, Option<u32>) {
    let engage = policy.extended_reasoning_allowed
        && profile.supports_reasoning
        && tier == ComplexityTier::VeryHigh
        && policy.tolerates_reasoning();
    if !engage {
        return (false, None);
    }

    // Scale the budget to the latency headroom beyond the minimum
    // reasoning-tolerant target: 500ms of target buys the floor, each
    // additional second buys another 8k tokens.
    let headroom_ms = policy.latency_target_ms.saturating_sub(500);
    let scaled = MIN_REASONING_BUDGET + u32::try_from(headroom_ms / 1000 * 8192).unwrap_or(0);
    let budget = scaled.clamp(MIN_REASONING_BUDGET, policy.max_reasoning_budget_tokens);
    (true, Some(budget))
}
