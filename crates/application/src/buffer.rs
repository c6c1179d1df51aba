//! Bounded frame buffer between ingest and transcription
//!
//! The transcription stage drains at its own consumption rate; this
//! buffer absorbs the difference without unbounded growth. When it is
//! full the configured overflow policy applies — either the oldest
//! frame is evicted or the producer waits out a short grace period.
//! Every drop is counted and observable, never silent.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use domain::AudioFrame;
use infrastructure::config::{BufferSettings, OverflowPolicy};
use tracing::warn;

/// Why a frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Buffer full and the drop-oldest policy evicted the oldest frame
    EvictedOldest,
    /// Buffer full and the grace period expired with no space
    GraceExpired,
}

/// Result of an enqueue attempt
#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Frame accepted without loss
    Accepted,
    /// Frame accepted, but another frame was dropped to make room
    Dropped(DropReason),
}

/// Bounded per-call frame buffer
#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<AudioFrame>,
    settings: BufferSettings,
    drops: Arc<AtomicU64>,
}

impl FrameBuffer {
    /// Create a buffer with the given settings
    pub fn new(settings: BufferSettings) -> Self {
        Self {
            frames: VecDeque::with_capacity(settings.capacity_frames),
            settings,
            drops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of buffered frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total frames dropped since creation
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Shared handle to the drop counter, for observers
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.drops)
    }

    /// Enqueue a frame, applying the overflow policy when full
    ///
    /// With `BlockProducer` this awaits up to the grace period for the
    /// consumer to make room; the buffer never exceeds its capacity
    /// regardless of how long downstream stalls.
    pub async fn enqueue(&mut self, frame: AudioFrame) -> EnqueueOutcome {
        if self.frames.len() < self.settings.capacity_frames {
            self.frames.push_back(frame);
            return EnqueueOutcome::Accepted;
        }

        match self.settings.overflow {
            OverflowPolicy::DropOldest => {
                self.frames.pop_front();
                self.frames.push_back(frame);
                self.count_drop(DropReason::EvictedOldest);
                EnqueueOutcome::Dropped(DropReason::EvictedOldest)
            },
            OverflowPolicy::BlockProducer { grace_ms } => {
                // The consumer runs on the same task in practice, so a
                // sleep is the grace period; space cannot open while we
                // hold &mut self.
                tokio::time::sleep(Duration::from_millis(grace_ms)).await;
                if self.frames.len() < self.settings.capacity_frames {
                    self.frames.push_back(frame);
                    EnqueueOutcome::Accepted
                } else {
                    self.count_drop(DropReason::GraceExpired);
                    EnqueueOutcome::Dropped(DropReason::GraceExpired)
                }
            },
        }
    }

    /// Take the oldest buffered frame
    pub fn pop(&mut self) -> Option<AudioFrame> {
        self.frames.pop_front()
    }

    /// Return a frame to the front after a failed downstream push
    pub fn requeue_front(&mut self, frame: AudioFrame) {
        if self.frames.len() == self.settings.capacity_frames {
            // Keep the bound: requeueing beats keeping the newest frame
            self.frames.pop_back();
            self.count_drop(DropReason::EvictedOldest);
        }
        self.frames.push_front(frame);
    }

    /// Discard all buffered frames
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    fn count_drop(&self, reason: DropReason) {
        let total = self.drops.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(?reason, total_drops = total, "Frame dropped");
        metrics::counter!("frames_dropped_total").increment(1);
    }
}
