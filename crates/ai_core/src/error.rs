//! Inference errors

use thiserror::Error;

/// Errors that can occur during generation
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Failed to connect to the generation service
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to the generation service failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Backend not found or not loaded
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    /// Response parsing failed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No delta arrived within the inter-token timeout
    #[error("Inter-token timeout after {0}ms")]
    InterTokenTimeout(u64),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Authentication with the service failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Streaming error
    #[error("Stream error: {0}")]
    StreamError(String),
}

impl InferenceError {
    /// Whether the failure is worth a same-turn re-selection
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::RequestFailed(_)
                | Self::InterTokenTimeout(_)
                | Self::RateLimited
                | Self::StreamError(_)
        )
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::InterTokenTimeout(30_000)
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inter_token_timeout_message() {
        let err = InferenceError::InterTokenTimeout(250);
        assert_eq!(err.to_string(), "Inter-token timeout after 250ms");
    }

    #[test]
    fn transient_classification() {
        assert!(InferenceError::InterTokenTimeout(250).is_transient());
        assert!(InferenceError::RateLimited.is_transient());
        assert!(!InferenceError::AuthFailed("bad key".into()).is_transient());
        assert!(!InferenceError::BackendNotAvailable("frontier-1".into()).is_transient());
    }
}
