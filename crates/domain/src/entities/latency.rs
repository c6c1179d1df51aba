//! Per-stage latency measurements
//!
//! Immutable once recorded; the infrastructure profiler aggregates them
//! into rolling percentile windows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::CallId;

/// One timed stage invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyMeasurement {
    /// Stage that was timed (e.g. `stt.first_partial`, `llm.stream`)
    pub stage: String,
    /// Call the measurement belongs to
    pub call_id: CallId,
    /// When the stage call started
    pub started_at: DateTime<Utc>,
    /// When the stage call completed
    pub ended_at: DateTime<Utc>,
}

impl LatencyMeasurement {
    /// Record a measurement
    pub fn new(
        stage: impl Into<String>,
        call_id: CallId,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage: stage.into(),
            call_id,
            started_at,
            ended_at,
        }
    }

    /// Duration of the stage call in milliseconds
    ///
    /// Clock skew can make the interval negative; that clamps to zero.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from((self.ended_at - self.started_at).num_milliseconds()).unwrap_or(0)
    }
}
