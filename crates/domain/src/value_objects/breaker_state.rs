//! Circuit breaker state values
//!
//! The state machine itself lives in the infrastructure layer; the state
//! vocabulary is part of the domain because breaker transitions are
//! emitted as pipeline events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of one (service, location) circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Service is unhealthy, requests fail fast
    Open,
    /// Testing whether the service has recovered with a single probe
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}
