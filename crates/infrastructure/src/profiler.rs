//! Latency profiling for pipeline stages
//!
//! Every external call is timed. Measurements land in a rolling window
//! per stage (last N durations) from which p50/p95/p99 are computed for
//! the router's policy decisions and for alerting. Each measurement is
//! also forwarded to the metrics facade and, when a channel is
//! attached, emitted as a `StageLatencyRecorded` event.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Instant;

use chrono::Utc;
use domain::{CallId, LatencyMeasurement, PipelineEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

/// Rolling percentile snapshot for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    /// Number of measurements in the window
    pub count: usize,
    /// Median duration in milliseconds
    pub p50_ms: u64,
    /// 95th percentile duration in milliseconds
    pub p95_ms: u64,
    /// 99th percentile duration in milliseconds
    pub p99_ms: u64,
}

#[derive(Debug)]
struct Window {
    durations: VecDeque<u64>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            durations: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, duration_ms: u64) {
        if self.durations.len() == self.capacity {
            self.durations.pop_front();
        }
        self.durations.push_back(duration_ms);
    }

    fn percentile(&self, p: f64) -> u64 {
        if self.durations.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.durations.iter().copied().collect();
        sorted.sort_unstable();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }
}

/// Process-wide latency aggregator
pub struct LatencyProfiler {
    windows: Mutex<HashMap<String, Window>>,
    window_capacity: usize,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl std::fmt::Debug for LatencyProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyProfiler")
            .field("stages", &self.windows.lock().len())
            .field("window_capacity", &self.window_capacity)
            .finish_non_exhaustive()
    }
}

impl Default for LatencyProfiler {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LatencyProfiler {
    /// Create a profiler keeping the last `window_capacity` durations
    /// per stage
    pub fn new(window_capacity: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_capacity: window_capacity.max(1),
            events: None,
        }
    }

    /// Attach an event channel for `StageLatencyRecorded` events
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Record one measurement
    pub fn record(&self, measurement: &LatencyMeasurement) {
        let duration_ms = measurement.duration_ms();
        trace!(stage = %measurement.stage, duration_ms, "Stage latency recorded");

        {
            let mut windows = self.windows.lock();
            windows
                .entry(measurement.stage.clone())
                .or_insert_with(|| Window::new(self.window_capacity))
                .push(duration_ms);
        }

        #[allow(clippy::cast_precision_loss)]
        metrics::histogram!(
            "stage_duration_ms",
            "stage" => measurement.stage.clone(),
        )
        .record(duration_ms as f64);

        if let Some(ref events) = self.events {
            let _ = events.send(PipelineEvent::StageLatencyRecorded {
                call_id: measurement.call_id,
                stage: measurement.stage.clone(),
                duration_ms,
            });
        }
    }

    /// Time an async operation and record it under `stage`
    pub async fn time<F, T>(&self, stage: &str, call_id: CallId, operation: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = operation.await;
        let elapsed = started.elapsed();

        let measurement = LatencyMeasurement::new(
            stage,
            call_id,
            started_at,
            started_at
                + chrono::Duration::milliseconds(i64::try_from(elapsed.as_millis()).unwrap_or(0)),
        );
        self.record(&measurement);
        result
    }

    /// Percentile snapshot for one stage, if any measurements exist
    pub fn stats(&self, stage: &str) -> Option<StageStats> {
        let windows = self.windows.lock();
        let window = windows.get(stage)?;
        if window.durations.is_empty() {
            return None;
        }
        Some(StageStats {
            count: window.durations.len(),
            p50_ms: window.percentile(50.0),
            p95_ms: window.percentile(95.0),
            p99_ms: window.percentile(99.0),
        })
    }

    /// Stages with at least one measurement
    pub fn stages(&self) -> Vec<String> {
        self.windows.lock().keys().cloned().collect()
    }
}
