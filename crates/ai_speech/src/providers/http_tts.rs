//! Streaming HTTP synthesis provider
//!
//! One request per segment; the service streams raw audio chunks back
//! as they render, so the first chunk is playable well before the
//! whole segment has been synthesized.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use domain::StreamSegment;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::TtsProviderConfig;
use crate::error::SpeechError;
use crate::ports::{SynthesisStream, TextToSpeech};

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
    model: &'a str,
}

/// Streaming HTTP text-to-speech provider
#[derive(Debug, Clone)]
pub struct HttpTextToSpeech {
    client: reqwest::Client,
    config: TtsProviderConfig,
}

impl HttpTextToSpeech {
    /// Create a provider from configuration
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(config: TtsProviderConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SpeechError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn synthesize_url(&self) -> String {
        format!("{}/v1/synthesize/stream", self.config.base_url)
    }
}

#[async_trait]
impl TextToSpeech for HttpTextToSpeech {
    #[instrument(skip(self, segment), fields(index = segment.index, text_len = segment.text.len()))]
    async fn synthesize(&self, segment: &StreamSegment) -> Result<SynthesisStream, SpeechError> {
        let request = SynthesizeRequest {
            text: &segment.text,
            voice: &self.config.voice,
            model: &self.config.model,
        };

        let response = self
            .client
            .post(self.synthesize_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SpeechError::AuthFailed(status.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SpeechError::RateLimited);
        }
        if !status.is_success() {
            return Err(SpeechError::SynthesisFailed(format!(
                "synthesis service returned {status}"
            )));
        }

        debug!(index = segment.index, "Synthesis stream opened");

        let chunks = response
            .bytes_stream()
            .map(|result| result.map_err(SpeechError::from));
        Ok(Box::pin(chunks))
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn default_voice(&self) -> &str {
        &self.config.voice
    }
}
