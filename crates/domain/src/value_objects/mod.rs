//! Value objects for the voice pipeline domain

pub mod breaker_state;
pub mod call_id;
pub mod region;

pub use breaker_state::CircuitState;
pub use call_id::CallId;
pub use region::{CallerRegion, LocationKind, ProcessingLocation};
