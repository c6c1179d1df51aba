//! Streaming HTTP transcription provider
//!
//! Speaks a duplex NDJSON protocol: audio frames go up as the request
//! body (chunked), transcript deltas come down as newline-delimited
//! JSON. Requires an HTTP/2 capable service so both directions stream
//! concurrently.
//!
//! Connection failures are transient: the driver reconnects with capped
//! exponential backoff while keeping a ring of recent frames to replay,
//! so a blip does not lose the tail of an utterance. Once the attempts
//! are exhausted the driver emits `TranscriptionUnavailable` on the
//! delta channel and exits; the orchestrator decides what the caller
//! hears.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use domain::{AudioFrame, CallId, FrameEncoding};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};

use crate::config::SttProviderConfig;
use crate::error::SpeechError;
use crate::ports::{SpeechToText, SttStream};
use crate::types::{SttEvent, TranscriptDelta};

/// Wire format of one transcript delta line
#[derive(Debug, Deserialize)]
struct WireDelta {
    text: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Streaming HTTP speech-to-text provider
#[derive(Debug, Clone)]
pub struct HttpSpeechToText {
    client: reqwest::Client,
    config: SttProviderConfig,
}

impl HttpSpeechToText {
    /// Create a provider from configuration
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(config: SttProviderConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| SpeechError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn stream_url(&self) -> String {
        format!("{}/v1/transcribe/stream", self.config.base_url)
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    #[instrument(skip(self), fields(model = %self.config.model))]
    async fn open_stream(
        &self,
        call_id: CallId,
        encoding: FrameEncoding,
    ) -> Result<SttStream, SpeechError> {
        let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(self.config.replay_frames.max(1));
        let (delta_tx, delta_rx) = mpsc::channel::<SttEvent>(32);

        let driver = StreamDriver {
            client: self.client.clone(),
            config: self.config.clone(),
            url: self.stream_url(),
            call_id,
            encoding,
            frame_rx,
            delta_tx,
            replay: VecDeque::new(),
        };
        tokio::spawn(driver.run());

        Ok(SttStream::from_parts(frame_tx, delta_rx))
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
}

/// Owns the wire connection for one call's transcription stream
struct StreamDriver {
    client: reqwest::Client,
    config: SttProviderConfig,
    url: String,
    call_id: CallId,
    encoding: FrameEncoding,
    frame_rx: mpsc::Receiver<AudioFrame>,
    delta_tx: mpsc::Sender<SttEvent>,
    replay: VecDeque<AudioFrame>,
}

enum ConnectionEnd {
    /// Caller dropped the handle or the service finished cleanly
    Finished,
    /// Transient failure; worth reconnecting
    Lost(SpeechError),
}

impl StreamDriver {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            match self.run_connection().await {
                Ok(ConnectionEnd::Finished) => {
                    debug!(call_id = %self.call_id, "Transcription stream finished");
                    return;
                },
                Ok(ConnectionEnd::Lost(cause)) | Err(cause) => {
                    attempt += 1;
                    if attempt > self.config.max_reconnect_attempts {
                        warn!(
                            call_id = %self.call_id,
                            attempts = attempt - 1,
                            error = %cause,
                            "Transcription reconnects exhausted"
                        );
                        let _ = self
                            .delta_tx
                            .send(Err(SpeechError::TranscriptionUnavailable {
                                attempts: attempt - 1,
                                reason: cause.to_string(),
                            }))
                            .await;
                        return;
                    }
                    let delay = self.config.reconnect_delay_ms << (attempt - 1);
                    warn!(
                        call_id = %self.call_id,
                        attempt,
                        delay_ms = delay,
                        error = %cause,
                        "Transcription connection lost, reconnecting"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                },
            }
        }
    }

    /// Run one connection until it finishes or is lost
    async fn run_connection(&mut self) -> Result<ConnectionEnd, SpeechError> {
        let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(64);
        let body = reqwest::Body::wrap_stream(ReceiverStream::new(body_rx));

        let response = self
            .client
            .post(&self.url)
            .header("x-call-id", self.call_id.to_string())
            .query(&[
                ("model", self.config.model.as_str()),
                ("encoding", encoding_tag(self.encoding)),
            ])
            .body(body)
            .send()
            .await
            .map_err(SpeechError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                // Permanent; emit and stop without retrying
                let _ = self
                    .delta_tx
                    .send(Err(SpeechError::AuthFailed(status.to_string())))
                    .await;
                return Ok(ConnectionEnd::Finished);
            }
            return Err(SpeechError::RequestFailed(format!(
                "transcription service returned {status}"
            )));
        }

        // Replay the recent frames the previous connection may have lost
        for frame in &self.replay {
            if body_tx
                .send(Ok(Bytes::copy_from_slice(frame.payload())))
                .await
                .is_err()
            {
                return Ok(ConnectionEnd::Lost(SpeechError::StreamClosed(
                    "request body closed during replay".to_string(),
                )));
            }
        }
        debug!(
            call_id = %self.call_id,
            replayed = self.replay.len(),
            "Transcription stream connected"
        );

        let mut lines = LineDecoder::default();
        let mut byte_stream = response.bytes_stream();

        loop {
            tokio::select! {
                maybe_frame = self.frame_rx.recv() => {
                    match maybe_frame {
                        Some(frame) => {
                            if self.replay.len() == self.config.replay_frames {
                                self.replay.pop_front();
                            }
                            let payload = Bytes::copy_from_slice(frame.payload());
                            self.replay.push_back(frame);
                            if body_tx.send(Ok(payload)).await.is_err() {
                                return Ok(ConnectionEnd::Lost(SpeechError::StreamClosed(
                                    "request body closed".to_string(),
                                )));
                            }
                        },
                        // Handle dropped: close the body and drain the tail
                        None => {
                            drop(body_tx);
                            while let Some(chunk) = byte_stream.next().await {
                                let Ok(chunk) = chunk else { break };
                                for event in lines.feed(&chunk) {
                                    let _ = self.delta_tx.send(event).await;
                                }
                            }
                            return Ok(ConnectionEnd::Finished);
                        },
                    }
                },
                maybe_chunk = byte_stream.next() => {
                    match maybe_chunk {
                        Some(Ok(chunk)) => {
                            for event in lines.feed(&chunk) {
                                if self.delta_tx.send(event).await.is_err() {
                                    return Ok(ConnectionEnd::Finished);
                                }
                            }
                        },
                        Some(Err(e)) => {
                            return Ok(ConnectionEnd::Lost(SpeechError::from(e)));
                        },
                        None => {
                            return Ok(ConnectionEnd::Lost(SpeechError::StreamClosed(
                                "service closed the delta stream".to_string(),
                            )));
                        },
                    }
                },
            }
        }
    }
}

const fn encoding_tag(encoding: FrameEncoding) -> &'static str {
    match encoding {
        FrameEncoding::Mulaw8k => "mulaw8k",
        FrameEncoding::Alaw8k => "alaw8k",
        FrameEncoding::Pcm16Le8k => "pcm16le8k",
    }
}

/// Splits a chunked byte stream into NDJSON delta lines
///
/// Chunk boundaries do not align with lines, so partial lines carry
/// over between `feed` calls.
#[derive(Debug, Default)]
struct LineDecoder {
    pending: String,
}

impl LineDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<SttEvent> {
        let Ok(text) = std::str::from_utf8(chunk) else {
            return vec![Err(SpeechError::InvalidResponse(
                "invalid UTF-8 in delta stream".to_string(),
            ))];
        };
        self.pending.push_str(text);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            events.push(parse_delta(line));
        }
        events
    }
}

fn parse_delta(line: &str) -> SttEvent {
    let wire: WireDelta = serde_json::from_str(line)
        .map_err(|e| SpeechError::InvalidResponse(format!("JSON parse error: {e}")))?;
    Ok(TranscriptDelta {
        text: wire.text,
        is_final: wire.is_final,
        confidence: wire.confidence,
    })
}
