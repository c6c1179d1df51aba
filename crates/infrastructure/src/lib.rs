//! Infrastructure layer - shared runtime machinery
//!
//! Process-wide concerns the per-call pipelines share: the circuit
//! breaker registry, the latency profiler, generic retry, layered
//! configuration loading, and telemetry initialization.

pub mod adapters;
pub mod config;
pub mod error;
pub mod profiler;
pub mod retry;
pub mod telemetry;

pub use adapters::{BreakerConfig, BreakerRegistry, CircuitBreakerError};
pub use config::Settings;
pub use error::InfrastructureError;
pub use profiler::{LatencyProfiler, StageStats};
pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
pub use telemetry::{TelemetryConfig, init_telemetry};
