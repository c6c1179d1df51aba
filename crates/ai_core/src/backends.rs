//! Declarative backend characteristics table
//!
//! The router scores candidates from this table instead of hard-coding
//! backend names in branch logic. Each profile describes one generation
//! backend's latency class, relative cost, capability ceiling, and
//! whether it can run at the edge or emit extended reasoning.

use domain::{ComplexityTier, CostPriority};
use serde::{Deserialize, Serialize};

/// Characteristics of one generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendProfile {
    /// Stable identifier used in decisions and breaker keys
    pub id: String,
    /// Highest complexity tier this backend handles well
    pub max_tier: ComplexityTier,
    /// Expected first-token latency in milliseconds (without reasoning)
    pub expected_first_token_ms: u64,
    /// Relative cost per generated token (1.0 = cheapest in the table)
    pub relative_cost: f32,
    /// Whether the backend supports extended reasoning
    pub supports_reasoning: bool,
    /// Whether edge locations can host this backend
    pub edge_capable: bool,
}

/// The full table of known backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCatalog {
    profiles: Vec<BackendProfile>,
}

impl BackendCatalog {
    /// Build a catalog from explicit profiles
    pub fn new(profiles: Vec<BackendProfile>) -> Self {
        Self { profiles }
    }

    /// All profiles in the catalog
    pub fn profiles(&self) -> &[BackendProfile] {
        &self.profiles
    }

    /// Look up a profile by id
    pub fn get(&self, id: &str) -> Option<&BackendProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Candidate backends for a tier, best fit first
    ///
    /// A candidate must have `max_tier >= tier`. Ordering depends on the
    /// cost priority: quality-first sorts most capable first, high
    /// savings sorts cheapest first, balanced prefers the closest tier
    /// fit and breaks ties on cost. Within equal rank, lower expected
    /// latency wins.
    pub fn candidates_for(
        &self,
        tier: ComplexityTier,
        cost_priority: CostPriority,
    ) -> Vec<&BackendProfile> {
        let mut fit: Vec<&BackendProfile> =
            self.profiles.iter().filter(|p| p.max_tier >= tier).collect();

        match cost_priority {
            CostPriority::QualityFirst => {
                fit.sort_by(|a, b| {
                    b.max_tier
                        .cmp(&a.max_tier)
                        .then(a.expected_first_token_ms.cmp(&b.expected_first_token_ms))
                });
            },
            CostPriority::Balanced => {
                fit.sort_by(|a, b| {
                    a.max_tier
                        .cmp(&b.max_tier)
                        .then(a.relative_cost.total_cmp(&b.relative_cost))
                        .then(a.expected_first_token_ms.cmp(&b.expected_first_token_ms))
                });
            },
            CostPriority::HighSavings => {
                fit.sort_by(|a, b| {
                    a.relative_cost
                        .total_cmp(&b.relative_cost)
                        .then(a.expected_first_token_ms.cmp(&b.expected_first_token_ms))
                });
            },
        }
        fit
    }

    /// The absolute fallback: the fastest backend in the table
    ///
    /// Used when every fit candidate is breaker-open and the turn must
    /// degrade rather than fail.
    pub fn fastest(&self) -> Option<&BackendProfile> {
        self.profiles
            .iter()
            .min_by_key(|p| p.expected_first_token_ms)
    }
}

impl Default for BackendCatalog {
    fn default() -> Self {
        Self::new(vec![
            BackendProfile {
                id: "sprint-1".to_string(),
                max_tier: ComplexityTier::Low,
                expected_first_token_ms: 80,
                relative_cost: 1.0,
                supports_reasoning: false,
                edge_capable: true,
            },
            BackendProfile {
                id: "standard-1".to_string(),
                max_tier: ComplexityTier::Medium,
                expected_first_token_ms: 120,
                relative_cost: 2.5,
                supports_reasoning: false,
                edge_capable: true,
            },
            BackendProfile {
                id: "capable-1".to_string(),
                max_tier: ComplexityTier::High,
                expected_first_token_ms: 180,
                relative_cost: 6.0,
                supports_reasoning: true,
                edge_capable: false,
            },
            BackendProfile {
                id: "frontier-1".to_string(),
                max_tier: ComplexityTier::VeryHigh,
                expected_first_token_ms: 200,
                relative_cost: 15.0,
                supports_reasoning: true,
                edge_capable: false,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_all_tiers() {
        let catalog = BackendCatalog::default();
        for tier in [
            ComplexityTier::Low,
            ComplexityTier::Medium,
            ComplexityTier::High,
            ComplexityTier::VeryHigh,
        ] {
            assert!(
                !catalog.candidates_for(tier, CostPriority::Balanced).is_empty(),
                "no candidate for {tier}"
            );
        }
    }

    #[test]
    fn low_tier_balanced_prefers_cheapest_fit() {
        let catalog = BackendCatalog::default();
        let candidates = catalog.candidates_for(ComplexityTier::Low, CostPriority::Balanced);
        assert_eq!(candidates[0].id, "sprint-1");
    }

    #[test]
    fn quality_first_prefers_most_capable() {
        let catalog = BackendCatalog::default();
        let candidates = catalog.candidates_for(ComplexityTier::Low, CostPriority::QualityFirst);
        assert_eq!(candidates[0].id, "frontier-1");
    }

    #[test]
    fn very_high_tier_only_matches_frontier() {
        let catalog = BackendCatalog::default();
        let candidates = catalog.candidates_for(ComplexityTier::VeryHigh, CostPriority::Balanced);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "frontier-1");
    }

    #[test]
    fn high_savings_sorts_by_cost() {
        let catalog = BackendCatalog::default();
        let candidates = catalog.candidates_for(ComplexityTier::Low, CostPriority::HighSavings);
        let costs: Vec<f32> = candidates.iter().map(|p| p.relative_cost).collect();
        let mut sorted = costs.clone();
        sorted.sort_by(f32::total_cmp);
        assert_eq!(costs, sorted);
    }

    #[test]
    fn fastest_is_the_sprint_backend() {
        let catalog = BackendCatalog::default();
        assert_eq!(catalog.fastest().unwrap().id, "sprint-1");
    }

    #[test]
    fn get_by_id() {
        let catalog = BackendCatalog::default();
        assert!(catalog.get("frontier-1").is_some());
        assert!(catalog.get("unknown").is_none());
    }
}
