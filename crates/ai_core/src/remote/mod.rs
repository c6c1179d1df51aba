//! Remote generation gateway
//!
//! A single HTTP gateway fronts all generation backends; the chosen
//! backend and processing location travel in the request and the
//! gateway dispatches. Deltas come back as newline-delimited JSON.

mod streaming;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::GenerationConfig;
use crate::error::InferenceError;
use crate::ports::{DeltaStream, GenerationBackend, GenerationRequest, InferenceMessage};

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    backend: &'a str,
    location: String,
    messages: &'a [InferenceMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_budget_tokens: Option<u32>,
    stream: bool,
}

/// HTTP gateway implementing the generation port
#[derive(Debug, Clone)]
pub struct RemoteGenerationGateway {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl RemoteGenerationGateway {
    /// Create a gateway from configuration
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::ConnectionFailed` if the HTTP client
    /// cannot be built.
    pub fn new(config: GenerationConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn stream_url(&self) -> String {
        format!("{}/v1/generate/stream", self.config.base_url)
    }
}

#[async_trait]
impl GenerationBackend for RemoteGenerationGateway {
    #[instrument(
        skip(self, request),
        fields(
            backend = %request.decision.backend_id,
            location = %request.decision.processing_location,
            reasoning = request.decision.extended_reasoning_enabled,
        )
    )]
    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream, InferenceError> {
        let mut messages = request.messages;
        if let Some(ref system) = self.config.system_prompt {
            messages.insert(0, InferenceMessage::system(system.clone()));
        }

        let wire = WireRequest {
            backend: &request.decision.backend_id,
            location: request.decision.processing_location.to_string(),
            messages: &messages,
            reasoning_budget_tokens: request
                .decision
                .extended_reasoning_enabled
                .then_some(request.decision.reasoning_budget_tokens)
                .flatten(),
            stream: true,
        };

        let response = self
            .client
            .post(self.stream_url())
            .json(&wire)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(InferenceError::AuthFailed(status.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(InferenceError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(InferenceError::BackendNotAvailable(
                request.decision.backend_id.clone(),
            ));
        }
        if !status.is_success() {
            return Err(InferenceError::RequestFailed(format!(
                "generation gateway returned {status}"
            )));
        }

        debug!("Generation stream opened");
        Ok(streaming::create_stream(
            response,
            Duration::from_millis(self.config.inter_token_timeout_ms),
        ))
    }

    async fn health_check(&self) -> Result<bool, InferenceError> {
        let url = format!("{}/health", self.config.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "remote-gateway"
    }
}

pub use streaming::create_stream;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_builds_from_default_config() {
        let gateway = RemoteGenerationGateway::new(GenerationConfig::default()).unwrap();
        assert_eq!(gateway.name(), "remote-gateway");
        assert!(gateway.stream_url().ends_with("/v1/generate/stream"));
    }

    #[test]
    fn wire_request_skips_budget_when_absent() {
        let wire = WireRequest {
            backend: "sprint-1",
            location: "edge:eu-central".to_string(),
            messages: &[],
            reasoning_budget_tokens: None,
            stream: true,
        };
        let json = serde_json::to_string(&wire).unwrap();
        assert!(!json.contains("reasoning_budget_tokens"));
    }

    #[test]
    fn wire_request_includes_budget_when_present() {
        let wire = WireRequest {
            backend: "frontier-1",
            location: "cloud:us-east".to_string(),
            messages: &[],
            reasoning_budget_tokens: Some(4096),
            stream: true,
        };
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains(r#""reasoning_budget_tokens":4096"#));
    }
}
