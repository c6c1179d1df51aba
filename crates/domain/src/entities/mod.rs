//! Domain entities

pub mod audio_frame;
pub mod decision;
pub mod latency;
pub mod region_profile;
pub mod segment;
pub mod utterance;

pub use audio_frame::{AudioFrame, FrameEncoding};
pub use decision::{ComplexityTier, CostPriority, ModelSelectionDecision};
pub use latency::LatencyMeasurement;
pub use region_profile::RegionProfile;
pub use segment::{SegmentBoundary, StreamSegment};
pub use utterance::Utterance;
