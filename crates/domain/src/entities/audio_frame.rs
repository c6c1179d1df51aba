//! Audio frames as delivered by the telephony ingress
//!
//! Frames are fixed-size, sequence-numbered, and immutable once created.
//! Sequence numbers are monotonically increasing within a call; gaps are
//! tolerated (packet loss) but logged by the ingest stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Encoding of an audio frame's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEncoding {
    /// G.711 μ-law companded PCM, 8 kHz mono, 1 byte per sample
    Mulaw8k,
    /// G.711 A-law companded PCM, 8 kHz mono, 1 byte per sample
    Alaw8k,
    /// Linear 16-bit little-endian PCM, 8 kHz mono, 2 bytes per sample
    Pcm16Le8k,
}

impl FrameEncoding {
    /// Sample rate in Hz
    pub const fn sample_rate(&self) -> u32 {
        8000
    }

    /// Bytes per sample for this encoding
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Mulaw8k | Self::Alaw8k => 1,
            Self::Pcm16Le8k => 2,
        }
    }

    /// Number of samples represented by a payload of `len` bytes
    pub const fn samples_in(&self, len: usize) -> usize {
        len / self.bytes_per_sample()
    }
}

/// One immutable frame of call audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFrame {
    payload: Vec<u8>,
    sequence: u64,
    captured_at: DateTime<Utc>,
    encoding: FrameEncoding,
}

impl AudioFrame {
    /// Create a new frame
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidFrame` if the payload is empty or its
    /// length is not a whole number of samples for the encoding.
    pub fn new(
        payload: Vec<u8>,
        sequence: u64,
        captured_at: DateTime<Utc>,
        encoding: FrameEncoding,
    ) -> Result<Self, DomainError> {
        if payload.is_empty() {
            return Err(DomainError::InvalidFrame("empty payload".to_string()));
        }
        if payload.len() % encoding.bytes_per_sample() != 0 {
            return Err(DomainError::InvalidFrame(format!(
                "payload length {} is not a whole number of samples",
                payload.len()
            )));
        }
        Ok(Self {
            payload,
            sequence,
            captured_at,
            encoding,
        })
    }

    /// The raw payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The per-call sequence number
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When this frame was captured at the ingress
    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// The payload encoding
    pub const fn encoding(&self) -> FrameEncoding {
        self.encoding
    }

    /// Duration of audio in this frame, in milliseconds
    pub fn duration_ms(&self) -> u64 {
        let samples = self.encoding.samples_in(self.payload.len()) as u64;
        samples * 1000 / u64::from(self.encoding.sample_rate())
    }
}
