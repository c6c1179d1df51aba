//! Generic retry with exponential backoff
//!
//! Adapters retry transient failures within their own narrow scope,
//! bounded to a small number of attempts; the pipeline orchestrator is
//! the only place that decides fallback or termination. Jitter keeps
//! simultaneous calls from hammering a recovering service in lockstep.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum number of retries (attempts = retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Jitter fraction applied to each delay (0.0 disables)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

const fn default_initial_delay_ms() -> u64 {
    50
}

const fn default_max_delay_ms() -> u64 {
    2000
}

const fn default_max_retries() -> u32 {
    3
}

fn default_jitter_factor() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// No jitter, for deterministic tests
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Delay for a 0-indexed retry attempt: doubling, capped, jittered
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay_ms as f64) * 2f64.powi(i32::try_from(attempt).unwrap_or(30));
        let capped = base.min(self.max_delay_ms as f64);
        let delayed = if self.jitter_factor > 0.0 {
            let range = capped * self.jitter_factor;
            let jitter = rand::rng().random_range(-range..=range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };
        Duration::from_millis(delayed as u64)
    }
}

/// Errors that know whether a retry is worthwhile
pub trait Retryable {
    /// True when the failure is transient
    fn is_retryable(&self) -> bool;
}

impl Retryable for ai_speech::SpeechError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for ai_core::InferenceError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Result of a retried operation plus attempt metadata
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// Final outcome
    pub result: Result<T, E>,
    /// Attempts made (1 = no retries)
    pub attempts: u32,
}

impl<T, E> RetryResult<T, E> {
    /// Convert to a plain result, discarding metadata
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Execute an async operation, retrying transient failures
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "Operation succeeded after retries");
                }
                return RetryResult {
                    result: Ok(value),
                    attempts,
                };
            },
            Err(err) => {
                let retry_attempt = attempts - 1;
                if !err.is_retryable() || retry_attempt >= config.max_retries {
                    if err.is_retryable() {
                        warn!(attempts, error = %err, "Operation failed after max retries");
                    } else {
                        debug!(error = %err, "Non-retryable failure");
                    }
                    return RetryResult {
                        result: Err(err),
                        attempts,
                    };
                }

                let delay = config.delay_for_attempt(retry_attempt);
                warn!(
                    attempt = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            },
        }
    }
}

/// Convenience wrapper returning only the result
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    with_retry(config, operation).await.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use ai_speech::SpeechError;

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig {
            initial_delay_ms: 100,
            max_delay_ms: 300,
            max_retries: 5,
            jitter_factor: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(config.delay_for_attempt(1).as_millis(), 200);
        assert_eq!(config.delay_for_attempt(2).as_millis(), 300);
        assert_eq!(config.delay_for_attempt(10).as_millis(), 300);
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = RetryConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 1000,
            max_retries: 3,
            jitter_factor: 0.1,
        };
        for _ in 0..20 {
            let ms = config.delay_for_attempt(0).as_millis();
            assert!((900..=1100).contains(&ms), "delay {ms} out of range");
        }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let config = RetryConfig::default().without_jitter();
        let result = with_retry(&config, || async { Ok::<_, SpeechError>(7) }).await;
        assert_eq!(result.attempts, 1);
        assert_eq!(result.result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let config = RetryConfig {
            initial_delay_ms: 1,
            ..RetryConfig::default().without_jitter()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let result = with_retry(&config, || {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SpeechError::Timeout(10))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.attempts, 3);
        assert_eq!(result.result.unwrap(), 42);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let config = RetryConfig::default().without_jitter();
        let calls = Arc::new(AtomicU32::new(0));
        let result: RetryResult<(), _> = with_retry(&config, || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SpeechError::InvalidAudio("corrupt".to_string()))
            }
        })
        .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.result.is_err());
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let config = RetryConfig {
            initial_delay_ms: 1,
            max_retries: 2,
            ..RetryConfig::default().without_jitter()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let result: RetryResult<(), _> = with_retry(&config, || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SpeechError::RateLimited)
            }
        })
        .await;

        assert_eq!(result.attempts, 3);
        assert!(result.result.is_err());
    }

    #[tokio::test]
    async fn inference_errors_are_classified() {
        use ai_core::InferenceError;
        assert!(InferenceError::InterTokenTimeout(100).is_retryable());
        assert!(!InferenceError::AuthFailed("key".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn retry_convenience_returns_plain_result() {
        let config = RetryConfig::default().without_jitter();
        let result: Result<i32, SpeechError> = retry(&config, || async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }
}
