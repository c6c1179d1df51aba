//! Speakable segments of generated text
//!
//! The segmenter cuts the generation stream into complete, speakable
//! units. Segment order is significant end-to-end: synthesis may run
//! several segments concurrently but the outbound audio must be emitted
//! in segment-index order.

use serde::{Deserialize, Serialize};

/// Why a segment was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentBoundary {
    /// Ended at sentence-terminal punctuation or a paragraph break
    SentenceTerminal,
    /// Buffer exceeded the maximum length without a boundary
    ForcedFlush,
    /// Stream ended with text still buffered
    EndOfTurn,
}

/// One speakable chunk of generated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSegment {
    /// Position of this segment within the turn, starting at 0
    pub index: u32,
    /// The text to synthesize
    pub text: String,
    /// What terminated the segment
    pub boundary: SegmentBoundary,
}

impl StreamSegment {
    /// Create a segment
    pub fn new(index: u32, text: impl Into<String>, boundary: SegmentBoundary) -> Self {
        Self {
            index,
            text: text.into(),
            boundary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_carries_index_and_text() {
        let seg = StreamSegment::new(2, "Hello there.", SegmentBoundary::SentenceTerminal);
        assert_eq!(seg.index, 2);
        assert_eq!(seg.text, "Hello there.");
        assert_eq!(seg.boundary, SegmentBoundary::SentenceTerminal);
    }

    #[test]
    fn boundary_serializes_snake_case() {
        let json = serde_json::to_string(&SegmentBoundary::ForcedFlush).unwrap();
        assert_eq!(json, r#""forced_flush""#);
    }
}
