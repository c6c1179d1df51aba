//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// An audio frame violated a structural invariant
    #[error("Invalid audio frame: {0}")]
    InvalidFrame(String),

    /// A region code was malformed
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// A delta or finalize was applied to an already-sealed utterance
    #[error("Utterance already final (turn {turn_index})")]
    UtteranceAlreadyFinal {
        /// The turn index of the sealed utterance
        turn_index: u32,
    },
}
