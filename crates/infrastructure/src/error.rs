//! Infrastructure errors

use thiserror::Error;

/// Errors raised by infrastructure machinery
#[derive(Debug, Error)]
pub enum InfrastructureError {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telemetry initialization failed
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl From<config::ConfigError> for InfrastructureError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_message() {
        let err = InfrastructureError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }
}
