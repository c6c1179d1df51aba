//! AI core - generation backends and adaptive routing
//!
//! Defines the generation port (a token-delta stream with separate
//! reasoning and answer channels), the declarative backend
//! characteristics table, and the adaptive model router that picks a
//! backend and processing location per finalized utterance.

pub mod backends;
pub mod config;
pub mod error;
pub mod ports;
pub mod remote;
pub mod router;

pub use backends::{BackendCatalog, BackendProfile};
pub use config::GenerationConfig;
pub use error::InferenceError;
pub use ports::{
    DeltaStream, GenerationBackend, GenerationDelta, GenerationRequest, InferenceMessage,
};
pub use remote::RemoteGenerationGateway;
pub use router::{CallContext, ModelRouter, NoBreakers, RouterPolicy, ServiceHealth};
