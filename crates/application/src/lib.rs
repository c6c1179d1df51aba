//! Application layer for voicepipe
//!
//! Orchestrates one pipeline instance per active call: frame ingest
//! through VAD and the bounded buffer, streaming transcription, the
//! routed generation turn, segmentation, and ordered synthesis output.
//! All cross-stage failures funnel into one closed taxonomy that only
//! the orchestrator acts on.

pub mod buffer;
pub mod error;
pub mod reorder;
pub mod segmenter;
pub mod services;

pub use buffer::{DropReason, EnqueueOutcome, FrameBuffer};
pub use error::{ApplicationError, StageFailure};
pub use reorder::SegmentReorderBuffer;
pub use segmenter::ResponseSegmenter;
pub use services::call_manager::{CallHandle, CallManager};
pub use services::pipeline_service::{CallPipeline, OutboundAudio, PipelineConfig, PipelineDeps};
