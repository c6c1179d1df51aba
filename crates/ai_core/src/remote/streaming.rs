//! Streaming response handling for the generation gateway
//!
//! The gateway emits newline-delimited JSON deltas. Chunk boundaries do
//! not align with lines, so a carry buffer spans chunks. The whole
//! stream is wrapped in an inter-token timeout: a stall longer than the
//! configured window aborts the stream with a transient error.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Response;
use serde::Deserialize;
use tracing::trace;

use crate::error::InferenceError;
use crate::ports::{DeltaStream, GenerationDelta};

/// Gateway wire format for one delta line
#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Create a delta stream from an HTTP response
pub fn create_stream(response: Response, inter_token_timeout: Duration) -> DeltaStream {
    #[allow(clippy::cast_possible_truncation)]
    let timeout_ms = inter_token_timeout.as_millis() as u64;

    let byte_stream = response.bytes_stream();
    let delta_stream = byte_stream
        .scan(String::new(), |carry, result| {
            let events = match result {
                Ok(bytes) => parse_chunk(carry, &bytes),
                Err(e) => vec![Err(InferenceError::StreamError(e.to_string()))],
            };
            futures::future::ready(Some(events))
        })
        .flat_map(stream::iter);

    let timed = tokio_stream::StreamExt::timeout(delta_stream, inter_token_timeout).map(
        move |item| match item {
            Ok(event) => event,
            Err(_) => Err(InferenceError::InterTokenTimeout(timeout_ms)),
        },
    );

    Box::pin(timed)
}

/// Parse one network chunk into delta events, carrying partial lines
fn parse_chunk(carry: &mut String, bytes: &[u8]) -> Vec<Result<GenerationDelta, InferenceError>> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return vec![Err(InferenceError::InvalidResponse(
            "invalid UTF-8 in delta stream".to_string(),
        ))];
    };
    carry.push_str(text);

    let mut events = Vec::new();
    while let Some(pos) = carry.find('\n') {
        let line: String = carry.drain(..=pos).collect();
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        trace!(line = %line, "Parsing delta line");
        events.push(parse_line(line));
    }
    events
}

fn parse_line(line: &str) -> Result<GenerationDelta, InferenceError> {
    let wire: WireDelta = serde_json::from_str(line)
        .map_err(|e| InferenceError::InvalidResponse(format!("JSON parse error: {e}")))?;

    if wire.done {
        return Ok(GenerationDelta::Done);
    }
    let content = wire.content.unwrap_or_default();
    match wire.channel.as_deref() {
        Some("reasoning") => Ok(GenerationDelta::Reasoning(content)),
        Some("answer") | None => Ok(GenerationDelta::Answer(content)),
        Some(other) => Err(InferenceError::InvalidResponse(format!(
            "unknown delta channel: {other}"
        ))),
    }
}
