//! Circuit breakers for external service calls
//!
//! One breaker per (service, processing location) pair, shared by all
//! calls in the process. States:
//!
//! - **Closed**: normal operation, requests pass through
//! - **Open**: the pair is unhealthy, requests fail fast without
//!   touching the network
//! - **Half-Open**: after the cooldown, exactly one probe is allowed;
//!   success closes the breaker, failure reopens it
//!
//! Closed goes to Open after `failure_threshold` consecutive failures
//! inside the sliding `window_ms`. A failure outside the window starts
//! a fresh streak, so slow-dripping errors never trip the breaker.
//!
//! State transitions are emitted as `PipelineEvent`s for observability
//! and counted via the metrics facade.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use domain::{CircuitState, PipelineEvent, ProcessingLocation};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration shared by all breakers in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures within the window before opening
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Sliding window for the failure streak, in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Cooldown before an open breaker allows a probe, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_window_ms() -> u64 {
    10_000
}

const fn default_cooldown_ms() -> u64 {
    5000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_ms: default_window_ms(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Error returned when the breaker rejects a call without trying it
#[derive(Debug, Clone)]
pub struct CircuitBreakerError {
    /// Service the rejected call was for
    pub service: String,
    /// Location the rejected call was for
    pub location: ProcessingLocation,
}

impl std::error::Error for CircuitBreakerError {}

impl fmt::Display for CircuitBreakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circuit open for {}@{}: temporarily unavailable",
            self.service, self.location
        )
    }
}

/// Internal per-pair state
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    first_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerState {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            first_failure_at: None,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

type PairKey = (String, ProcessingLocation);

/// Process-wide registry of per-(service, location) breakers
///
/// The only cross-call shared state besides the latency aggregates;
/// mutated through one mutex, never from scattered per-call locks.
pub struct BreakerRegistry {
    config: BreakerConfig,
    states: Mutex<HashMap<PairKey, BreakerState>>,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("config", &self.config)
            .field("pairs", &self.states.lock().len())
            .finish_non_exhaustive()
    }
}

impl BreakerRegistry {
    /// Create a registry with the given configuration
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    /// Attach an event channel for `CircuitBreakerStateChanged` events
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current state of a pair's breaker
    ///
    /// Drives the Open → HalfOpen transition when the cooldown has
    /// elapsed, so reads are sufficient to keep breakers moving.
    pub fn state(&self, service: &str, location: &ProcessingLocation) -> CircuitState {
        let mut states = self.states.lock();
        let entry = states
            .entry((service.to_string(), location.clone()))
            .or_insert_with(BreakerState::new);
        self.refresh(service, location, entry);
        entry.state
    }

    /// Whether a pair's breaker is open (calls would be rejected)
    pub fn is_open(&self, service: &str, location: &ProcessingLocation) -> bool {
        self.state(service, location) == CircuitState::Open
    }

    /// Gate a call attempt
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError` when the breaker is open, or when
    /// it is half-open and another probe is already in flight. On `Ok`
    /// the caller must report the outcome via [`Self::record_success`]
    /// or [`Self::record_failure`].
    pub fn try_acquire(
        &self,
        service: &str,
        location: &ProcessingLocation,
    ) -> Result<(), CircuitBreakerError> {
        let mut states = self.states.lock();
        let entry = states
            .entry((service.to_string(), location.clone()))
            .or_insert_with(BreakerState::new);
        self.refresh(service, location, entry);

        match entry.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => Err(CircuitBreakerError {
                service: service.to_string(),
                location: location.clone(),
            }),
            CircuitState::HalfOpen => {
                if entry.probe_in_flight {
                    Err(CircuitBreakerError {
                        service: service.to_string(),
                        location: location.clone(),
                    })
                } else {
                    debug!(service, location = %location, "Allowing half-open probe");
                    entry.probe_in_flight = true;
                    Ok(())
                }
            },
        }
    }

    /// Record a successful call
    pub fn record_success(&self, service: &str, location: &ProcessingLocation) {
        let mut states = self.states.lock();
        let Some(entry) = states.get_mut(&(service.to_string(), location.clone())) else {
            return;
        };

        entry.failure_count = 0;
        entry.first_failure_at = None;

        if entry.state == CircuitState::HalfOpen {
            // One successful probe closes the breaker
            entry.probe_in_flight = false;
            entry.opened_at = None;
            self.transition(service, location, entry, CircuitState::Closed);
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, service: &str, location: &ProcessingLocation) {
        let now = Instant::now();
        let mut states = self.states.lock();
        let entry = states
            .entry((service.to_string(), location.clone()))
            .or_insert_with(BreakerState::new);

        match entry.state {
            CircuitState::Closed => {
                // Failures only streak inside the sliding window
                let window = Duration::from_millis(self.config.window_ms);
                let in_window = entry
                    .first_failure_at
                    .is_some_and(|first| now.duration_since(first) < window);
                if in_window {
                    entry.failure_count += 1;
                } else {
                    entry.failure_count = 1;
                    entry.first_failure_at = Some(now);
                }

                if entry.failure_count >= self.config.failure_threshold {
                    entry.opened_at = Some(now);
                    entry.failure_count = 0;
                    entry.first_failure_at = None;
                    self.transition(service, location, entry, CircuitState::Open);
                }
            },
            CircuitState::HalfOpen => {
                // Failed probe reopens immediately
                entry.probe_in_flight = false;
                entry.opened_at = Some(now);
                self.transition(service, location, entry, CircuitState::Open);
            },
            CircuitState::Open => {},
        }
    }

    /// Open → HalfOpen when the cooldown has elapsed
    fn refresh(&self, service: &str, location: &ProcessingLocation, entry: &mut BreakerState) {
        if entry.state == CircuitState::Open {
            let cooled = entry
                .opened_at
                .is_some_and(|at| at.elapsed() >= Duration::from_millis(self.config.cooldown_ms));
            if cooled {
                entry.probe_in_flight = false;
                self.transition(service, location, entry, CircuitState::HalfOpen);
            }
        }
    }

    fn transition(
        &self,
        service: &str,
        location: &ProcessingLocation,
        entry: &mut BreakerState,
        to: CircuitState,
    ) {
        let from = entry.state;
        if from == to {
            return;
        }
        entry.state = to;

        if to == CircuitState::Open {
            warn!(service, location = %location, %from, "Circuit opened");
        } else {
            debug!(service, location = %location, %from, %to, "Circuit transition");
        }
        metrics::counter!(
            "breaker_transitions_total",
            "service" => service.to_string(),
            "to" => to.to_string(),
        )
        .increment(1);

        if let Some(ref events) = self.events {
            let _ = events.send(PipelineEvent::CircuitBreakerStateChanged {
                service: service.to_string(),
                location: location.clone(),
                from,
                to,
            });
        }
    }
}

impl ai_core::ServiceHealth for BreakerRegistry {
    fn is_open(&self, service: &str, location: &ProcessingLocation) -> bool {
        Self::is_open(self, service, location)
    }
}
