//! Speech processing errors

use thiserror::Error;

/// Errors that can occur during speech processing
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Failed to connect to the speech service
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to the speech service failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Invalid audio format or corrupted frame
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    /// Invalid response from the service
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout during processing
    #[error("Speech processing timeout after {0}ms")]
    Timeout(u64),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Authentication with the service failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Transcription unavailable after exhausting reconnect attempts
    #[error("Transcription unavailable after {attempts} attempts: {reason}")]
    TranscriptionUnavailable { attempts: u32, reason: String },

    /// Synthesis failed
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// The stream was closed by the service or by cancellation
    #[error("Stream closed: {0}")]
    StreamClosed(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SpeechError {
    /// Whether the failure is worth retrying at the adapter level
    ///
    /// Connection resets, timeouts, and rate limiting are transient;
    /// malformed audio, auth failures, and bad configuration are not.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::RequestFailed(_)
                | Self::Timeout(_)
                | Self::RateLimited
                | Self::StreamClosed(_)
        )
    }
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(30_000)
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
    fn connection_failed_error_message() {
        let err = SpeechError::ConnectionFailed("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn transcription_unavailable_error_message() {
        let err = SpeechError::TranscriptionUnavailable {
            attempts: 3,
            reason: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Transcription unavailable after 3 attempts: connection reset"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(SpeechError::Timeout(50).is_transient());
        assert!(SpeechError::RateLimited.is_transient());
        assert!(SpeechError::ConnectionFailed("reset".into()).is_transient());
        assert!(!SpeechError::InvalidAudio("bad header".into()).is_transient());
        assert!(!SpeechError::AuthFailed("expired key".into()).is_transient());
        assert!(
            !SpeechError::TranscriptionUnavailable {
                attempts: 3,
                reason: "gone".into()
            }
            .is_transient(),
            "exhausted retries must not be retried again"
        );
    }
}
