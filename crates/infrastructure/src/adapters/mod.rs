//! Infrastructure adapters

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerConfig, BreakerRegistry, CircuitBreakerError};
