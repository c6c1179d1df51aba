//! Region-to-location mapping consulted by the model router
//!
//! A static, process-wide table built at startup: for each caller region
//! it holds the candidate processing locations ordered by expected
//! latency. Unknown regions fall back to a default chain.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value_objects::{CallerRegion, ProcessingLocation};

/// Static mapping from caller region to ordered candidate locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionProfile {
    regions: HashMap<CallerRegion, Vec<ProcessingLocation>>,
    fallback: Vec<ProcessingLocation>,
}

impl RegionProfile {
    /// Create a profile with the given fallback chain
    pub fn new(fallback: Vec<ProcessingLocation>) -> Self {
        Self {
            regions: HashMap::new(),
            fallback,
        }
    }

    /// Register the ordered candidate locations for a region
    #[must_use]
    pub fn with_region(
        mut self,
        region: CallerRegion,
        candidates: Vec<ProcessingLocation>,
    ) -> Self {
        self.regions.insert(region, candidates);
        self
    }

    /// Candidate locations for a caller region, best first
    ///
    /// Unknown regions get the fallback chain.
    pub fn candidates_for(&self, region: &CallerRegion) -> &[ProcessingLocation] {
        self.regions
            .get(region)
            .map_or(self.fallback.as_slice(), Vec::as_slice)
    }

    /// The fallback chain used for unknown regions
    pub fn fallback(&self) -> &[ProcessingLocation] {
        &self.fallback
    }
}

impl Default for RegionProfile {
    /// A two-region default: edge first, same-region cloud second,
    /// us-east cloud as the last resort.
    fn default() -> Self {
        let eu = CallerRegion::from_static("eu-central");
        let us = CallerRegion::from_static("us-east");
        Self::new(vec![
            ProcessingLocation::cloud("us-east"),
        ])
        .with_region(
            eu,
            vec![
                ProcessingLocation::edge("eu-central"),
                ProcessingLocation::cloud("eu-central"),
                ProcessingLocation::cloud("us-east"),
            ],
        )
        .with_region(
            us,
            vec![
                ProcessingLocation::edge("us-east"),
                ProcessingLocation::cloud("us-east"),
            ],
        )
    }
}
