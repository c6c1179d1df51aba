//! Port definitions for speech processing
//!
//! Defines the traits (ports) that speech adapters must implement. The
//! STT port is push/pull: the pipeline pushes frames into an open stream
//! and pulls transcript deltas off a channel at its own rate. The TTS
//! port returns a chunk stream per segment.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use domain::{AudioFrame, CallId, FrameEncoding, StreamSegment};
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::SpeechError;
use crate::types::SttEvent;

/// An open transcription stream for one call
///
/// Providers hand out this handle from
/// [`SpeechToText::open_stream`]; a driver task owned by the provider
/// sits behind the channels and does the wire work (including
/// reconnection). Dropping the handle tears the stream down.
#[derive(Debug)]
pub struct SttStream {
    frames: mpsc::Sender<AudioFrame>,
    deltas: mpsc::Receiver<SttEvent>,
}

impl SttStream {
    /// Assemble a stream handle from its two channel halves
    ///
    /// Used by providers and by test mocks.
    pub const fn from_parts(
        frames: mpsc::Sender<AudioFrame>,
        deltas: mpsc::Receiver<SttEvent>,
    ) -> Self {
        Self { frames, deltas }
    }

    /// Push one audio frame to the transcription service
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::StreamClosed` when the driver task has shut
    /// down (service gone, retries exhausted, or call cancelled).
    pub async fn push(&self, frame: AudioFrame) -> Result<(), SpeechError> {
        self.frames
            .send(frame)
            .await
            .map_err(|_| SpeechError::StreamClosed("transcription driver gone".to_string()))
    }

    /// Push a frame without waiting for channel capacity
    ///
    /// Lets a caller drain its own buffer at the stream's consumption
    /// rate: a `Full` result hands the frame back for re-buffering.
    pub fn try_push(&self, frame: AudioFrame) -> TryPush {
        match self.frames.try_send(frame) {
            Ok(()) => TryPush::Accepted,
            Err(mpsc::error::TrySendError::Full(frame)) => TryPush::Full(frame),
            Err(mpsc::error::TrySendError::Closed(_)) => TryPush::Closed,
        }
    }

    /// Receive the next transcript delta
    ///
    /// Returns `None` when the stream is finished and the driver has
    /// hung up.
    pub async fn next_delta(&mut self) -> Option<SttEvent> {
        self.deltas.recv().await
    }

}

/// Outcome of a non-blocking push
#[derive(Debug)]
pub enum TryPush {
    /// The stream accepted the frame
    Accepted,
    /// No capacity right now; the frame comes back to the caller
    Full(AudioFrame),
    /// The driver task has shut down
    Closed,
}

/// Port for streaming speech-to-text implementations
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Open a transcription stream for a call
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` when the stream cannot be established.
    async fn open_stream(
        &self,
        call_id: CallId,
        encoding: FrameEncoding,
    ) -> Result<SttStream, SpeechError>;

    /// Check if the transcription service is reachable
    async fn is_available(&self) -> bool;

    /// Name of the underlying model or service
    fn model_name(&self) -> &str;
}

/// Type alias for the audio chunk stream produced per segment
pub type SynthesisStream = Pin<Box<dyn Stream<Item = Result<Bytes, SpeechError>> + Send>>;

/// Port for streaming text-to-speech implementations
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize one segment, streaming audio chunks as they render
    ///
    /// Several segments may be in flight concurrently; callers are
    /// responsible for re-ordering the output by segment index.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if synthesis cannot start.
    async fn synthesize(&self, segment: &StreamSegment) -> Result<SynthesisStream, SpeechError>;

    /// Check if the synthesis service is reachable
    async fn is_available(&self) -> bool;

    /// Name of the underlying model or service
    fn model_name(&self) -> &str;

    /// Default voice identifier
    fn default_voice(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TranscriptDelta;
    use chrono::Utc;
    use domain::SegmentBoundary;
    use futures::StreamExt;

    struct MockStt;

    #[async_trait]
    impl SpeechToText for MockStt {
        async fn open_stream(
            &self,
            _call_id: CallId,
            _encoding: FrameEncoding,
        ) -> Result<SttStream, SpeechError> {
            let (frame_tx, mut frame_rx) = mpsc::channel::<AudioFrame>(8);
            let (delta_tx, delta_rx) = mpsc::channel(8);
            tokio::spawn(async move {
                let mut frames = 0u32;
                while frame_rx.recv().await.is_some() {
                    frames += 1;
                    let delta = if frames >= 3 {
                        TranscriptDelta::final_result("mock transcript", Some(0.9))
                    } else {
                        TranscriptDelta::partial("mock", Some(0.5))
                    };
                    let is_final = delta.is_final;
                    if delta_tx.send(Ok(delta)).await.is_err() || is_final {
                        break;
                    }
                }
            });
            Ok(SttStream::from_parts(frame_tx, delta_rx))
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "mock-stt"
        }
    }

    struct MockTts;

    #[async_trait]
    impl TextToSpeech for MockTts {
        async fn synthesize(
            &self,
            segment: &StreamSegment,
        ) -> Result<SynthesisStream, SpeechError> {
            let chunk = Bytes::from(segment.text.clone().into_bytes());
            Ok(Box::pin(futures::stream::iter(vec![Ok(chunk)])))
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "mock-tts"
        }

        fn default_voice(&self) -> &str {
            "default"
        }
    }

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(vec![0xFF; 160], seq, Utc::now(), FrameEncoding::Mulaw8k).unwrap()
    }

    #[tokio::test]
    async fn mock_stt_streams_deltas_until_final() {
        let stt = MockStt;
        let mut stream = stt
            .open_stream(CallId::new(), FrameEncoding::Mulaw8k)
            .await
            .unwrap();

        for seq in 0..3 {
            stream.push(frame(seq)).await.unwrap();
        }

        let first = stream.next_delta().await.unwrap().unwrap();
        assert!(!first.is_final);

        let second = stream.next_delta().await.unwrap().unwrap();
        assert!(!second.is_final);

        let last = stream.next_delta().await.unwrap().unwrap();
        assert!(last.is_final);
        assert_eq!(last.text, "mock transcript");
    }

    #[tokio::test]
    async fn push_after_driver_exit_reports_closed() {
        let stt = MockStt;
        let mut stream = stt
            .open_stream(CallId::new(), FrameEncoding::Mulaw8k)
            .await
            .unwrap();

        for seq in 0..3 {
            stream.push(frame(seq)).await.unwrap();
        }
        // Drain through the final delta; the driver then exits
        while let Some(event) = stream.next_delta().await {
            if event.unwrap().is_final {
                break;
            }
        }

        // The driver may take a moment to drop the receiver
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let result = stream.push(frame(99)).await;
        assert!(matches!(result, Err(SpeechError::StreamClosed(_))));
    }

    #[tokio::test]
    async fn mock_tts_streams_segment_audio() {
        let tts = MockTts;
        let segment = StreamSegment::new(0, "Hello.", SegmentBoundary::SentenceTerminal);
        let mut stream = tts.synthesize(&segment).await.unwrap();

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"Hello.");
        assert!(stream.next().await.is_none());
    }
}
