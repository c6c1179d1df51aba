//! Response segmentation
//!
//! Accumulates streamed answer deltas and cuts complete, speakable
//! segments as soon as they exist: at sentence-terminal punctuation, at
//! a paragraph break, or by forced flush when the buffer grows past the
//! maximum length without a boundary (long unbroken output must not
//! hold synthesis hostage). Segments carry a per-turn index and are
//! emitted in strict order; they are never merged or reordered after
//! emission.

use domain::{SegmentBoundary, StreamSegment};

/// Default forced-flush threshold in characters
const DEFAULT_MAX_SEGMENT_CHARS: usize = 240;

/// Incremental sentence segmenter for one turn's answer stream
#[derive(Debug)]
pub struct ResponseSegmenter {
    pending: String,
    next_index: u32,
    max_segment_chars: usize,
}

impl Default for ResponseSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEGMENT_CHARS)
    }
}

impl ResponseSegmenter {
    /// Create a segmenter with a forced-flush threshold
    pub fn new(max_segment_chars: usize) -> Self {
        Self {
            pending: String::new(),
            next_index: 0,
            max_segment_chars: max_segment_chars.max(1),
        }
    }

    /// Segments emitted so far
    pub const fn emitted(&self) -> u32 {
        self.next_index
    }

    /// Feed one answer delta; returns any segments completed by it
    pub fn push_delta(&mut self, delta: &str) -> Vec<StreamSegment> {
        self.pending.push_str(delta);
        let mut segments = Vec::new();

        loop {
            if let Some(cut) = self.find_boundary() {
                let text: String = self.pending.drain(..cut).collect();
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    segments.push(self.emit(trimmed, SegmentBoundary::SentenceTerminal));
                }
            } else if self.pending.chars().count() >= self.max_segment_chars {
                let cut = self.forced_cut();
                let text: String = self.pending.drain(..cut).collect();
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    segments.push(self.emit(trimmed, SegmentBoundary::ForcedFlush));
                }
            } else {
                break;
            }
        }
        segments
    }

    /// End of turn: flush whatever remains
    pub fn finish(&mut self) -> Option<StreamSegment> {
        let text = std::mem::take(&mut self.pending);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(self.emit(trimmed, SegmentBoundary::EndOfTurn))
    }

    fn emit(&mut self, text: &str, boundary: SegmentBoundary) -> StreamSegment {
        let segment = StreamSegment::new(self.next_index, text, boundary);
        self.next_index += 1;
        segment
    }

    /// Byte offset just past the first sentence boundary, if complete
    ///
    /// A terminal character only counts as a boundary once something
    /// follows it (whitespace or more text): "3." mid-stream may still
    /// be "3.5" once the next delta arrives.
    fn find_boundary(&self) -> Option<usize> {
        let mut chars = self.pending.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?') {
                if let Some(&(_, next)) = chars.peek() {
                    if next.is_whitespace() {
                        return Some(i + c.len_utf8() + next.len_utf8());
                    }
                }
            } else if c == '\n' {
                if let Some(&(_, '\n')) = chars.peek() {
                    return Some(i + 2);
                }
            }
        }
        None
    }

    /// Byte offset for a forced flush: the last whitespace before the
    /// limit, or the limit itself for one unbroken token
    fn forced_cut(&self) -> usize {
        let limit_byte = self
            .pending
            .char_indices()
            .nth(self.max_segment_chars)
            .map_or(self.pending.len(), |(i, _)| i);

        self.pending[..limit_byte]
            .rfind(char::is_whitespace)
            .map_or(limit_byte, |ws| {
                let width = self.pending[ws..].chars().next().map_or(1, char::len_utf8);
                ws + width
            })
    }
}
