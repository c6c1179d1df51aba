//! Caller regions and processing locations
//!
//! A caller region is where the caller's audio enters the system; a
//! processing location is where a pipeline stage's external service runs.
//! "Edge" and "cloud" are two abstract location kinds with different
//! latency and capability tradeoffs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Geographic region a call originates from (e.g. `eu-central`, `us-east`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerRegion(String);

impl CallerRegion {
    /// Create a caller region from a region code
    ///
    /// Region codes are lowercase alphanumerics with dashes.
    pub fn new(code: impl Into<String>) -> Result<Self, DomainError> {
        let code = code.into();
        if code.is_empty()
            || !code
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DomainError::InvalidRegion(code));
        }
        Ok(Self(code))
    }

    /// The region code
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Construct from a compile-time region code, skipping validation
    pub(crate) fn from_static(code: &'static str) -> Self {
        Self(code.to_string())
    }
}

impl fmt::Display for CallerRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of processing location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// Close to the caller, lowest latency, limited capability
    Edge,
    /// Centralized, higher latency, full capability
    Cloud,
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge => write!(f, "edge"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// A concrete place where a stage's external service runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessingLocation {
    kind: LocationKind,
    region: String,
}

impl ProcessingLocation {
    /// An edge location in the given region
    pub fn edge(region: impl Into<String>) -> Self {
        Self {
            kind: LocationKind::Edge,
            region: region.into(),
        }
    }

    /// A cloud location in the given region
    pub fn cloud(region: impl Into<String>) -> Self {
        Self {
            kind: LocationKind::Cloud,
            region: region.into(),
        }
    }

    /// The location kind
    pub const fn kind(&self) -> LocationKind {
        self.kind
    }

    /// The region this location runs in
    pub fn region(&self) -> &str {
        &self.region
    }
}

impl fmt::Display for ProcessingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_region_codes_accepted() {
        assert!(CallerRegion::new("eu-central").is_ok());
        assert!(CallerRegion::new("us-east-1").is_ok());
        assert!(CallerRegion::new("apac").is_ok());
    }

    #[test]
    fn invalid_region_codes_rejected() {
        assert!(CallerRegion::new("").is_err());
        assert!(CallerRegion::new("EU Central").is_err());
        assert!(CallerRegion::new("eu_central").is_err());
    }

    #[test]
    fn region_display_is_code() {
        let region = CallerRegion::new("eu-central").unwrap();
        assert_eq!(region.to_string(), "eu-central");
        assert_eq!(region.code(), "eu-central");
    }

    #[test]
    fn location_display_includes_kind_and_region() {
        assert_eq!(ProcessingLocation::edge("eu").to_string(), "edge:eu");
        assert_eq!(
            ProcessingLocation::cloud("us-east").to_string(),
            "cloud:us-east"
        );
    }

    #[test]
    fn locations_are_hashable_map_keys() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ProcessingLocation::edge("eu"));
        set.insert(ProcessingLocation::cloud("eu"));
        set.insert(ProcessingLocation::edge("eu"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn location_serialization_roundtrip() {
        let loc = ProcessingLocation::cloud("us-east");
        let json = serde_json::to_string(&loc).unwrap();
        let parsed: ProcessingLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, parsed);
    }
}
