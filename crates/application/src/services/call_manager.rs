//! Call supervision
//!
//! Spawns one independent pipeline task per active call and owns their
//! lifecycles. No shared mutable state between calls beyond the breaker
//! registry and latency aggregates the pipelines reference. Ending a
//! call aborts its task immediately; in-flight stage operations are
//! cancelled rather than awaited.

use std::collections::HashMap;

use domain::{AudioFrame, CallId, CallerRegion, PipelineEvent};
use infrastructure::config::Settings;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::ApplicationError;
use crate::services::pipeline_service::{
    CallPipeline, OutboundAudio, PipelineConfig, PipelineDeps,
};

/// Capacity of the ingress frame channel per call
const INGRESS_CHANNEL_FRAMES: usize = 32;
/// Capacity of the outbound audio channel per call
const OUTBOUND_CHANNEL_CHUNKS: usize = 64;

/// The ingress-facing handle for one call
#[derive(Debug)]
pub struct CallHandle {
    /// The call this handle controls
    pub call_id: CallId,
    /// Where the ingress pushes audio frames
    pub frames: mpsc::Sender<AudioFrame>,
    /// Where synthesized audio comes out, in segment order
    pub outbound: mpsc::Receiver<OutboundAudio>,
}

/// Supervises one pipeline task per active call
pub struct CallManager {
    deps: PipelineDeps,
    settings: Settings,
    events: mpsc::UnboundedSender<PipelineEvent>,
    active: Mutex<HashMap<CallId, JoinHandle<Result<(), ApplicationError>>>>,
}

impl std::fmt::Debug for CallManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallManager")
            .field("active_calls", &self.active.lock().len())
            .finish_non_exhaustive()
    }
}

impl CallManager {
    /// Create a manager over shared stage implementations
    pub fn new(
        deps: PipelineDeps,
        settings: Settings,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            deps,
            settings,
            events,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start a pipeline for a new call
    ///
    /// The returned handle is how the ingress feeds frames in and takes
    /// audio out. Dropping the frame sender ends the call gracefully.
    pub fn start_call(&self, call_id: CallId, region: CallerRegion) -> CallHandle {
        let (frames_tx, frames_rx) = mpsc::channel(INGRESS_CHANNEL_FRAMES);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CHUNKS);

        let config = PipelineConfig::from_settings(&self.settings, region);
        let pipeline = CallPipeline::new(
            call_id,
            config,
            self.deps.clone(),
            self.events.clone(),
            outbound_tx,
        );

        let task = tokio::spawn(pipeline.run(frames_rx));
        self.active.lock().insert(call_id, task);
        info!(call_id = %call_id, "Call started");

        CallHandle {
            call_id,
            frames: frames_tx,
            outbound: outbound_rx,
        }
    }

    /// Terminate a call immediately
    ///
    /// Aborts the pipeline task; pending stage operations are cancelled
    /// and per-call buffers dropped with it.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::CallNotFound` for an unknown call.
    pub fn end_call(&self, call_id: CallId) -> Result<(), ApplicationError> {
        let Some(task) = self.active.lock().remove(&call_id) else {
            return Err(ApplicationError::CallNotFound(call_id));
        };
        task.abort();
        info!(call_id = %call_id, "Call terminated");
        Ok(())
    }

    /// Number of calls with a live pipeline task
    pub fn active_calls(&self) -> usize {
        let mut active = self.active.lock();
        active.retain(|call_id, task| {
            let running = !task.is_finished();
            if !running {
                debug!(call_id = %call_id, "Reaping finished call task");
            }
            running
        });
        active.len()
    }

    /// Abort every active call (process shutdown)
    pub fn shutdown(&self) {
        let mut active = self.active.lock();
        for (call_id, task) in active.drain() {
            debug!(call_id = %call_id, "Aborting call on shutdown");
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ai_core::{BackendCatalog, ModelRouter};
    use domain::RegionProfile;
    use infrastructure::adapters::BreakerConfig;
    use infrastructure::{BreakerRegistry, LatencyProfiler};

    use async_trait::async_trait;

    struct UnusedStt;

    #[async_trait]
    impl ai_speech::SpeechToText for UnusedStt {
        async fn open_stream(
            &self,
            _call_id: CallId,
            _encoding: domain::FrameEncoding,
        ) -> Result<ai_speech::SttStream, ai_speech::SpeechError> {
            let (tx, _keep) = mpsc::channel(1);
            let (_drop, rx) = mpsc::channel(1);
            Ok(ai_speech::SttStream::from_parts(tx, rx))
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "unused"
        }
    }

    struct UnusedTts;

    #[async_trait]
    impl ai_speech::TextToSpeech for UnusedTts {
        async fn synthesize(
            &self,
            _segment: &domain::StreamSegment,
        ) -> Result<ai_speech::SynthesisStream, ai_speech::SpeechError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "unused"
        }

        fn default_voice(&self) -> &str {
            "unused"
        }
    }

    struct UnusedLlm;

    #[async_trait]
    impl ai_core::GenerationBackend for UnusedLlm {
        async fn stream(
            &self,
            _request: ai_core::GenerationRequest,
        ) -> Result<ai_core::DeltaStream, ai_core::InferenceError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn health_check(&self) -> Result<bool, ai_core::InferenceError> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "unused"
        }
    }

    fn manager() -> (CallManager, mpsc::UnboundedReceiver<PipelineEvent>) {
        let deps = PipelineDeps {
            stt: Arc::new(UnusedStt),
            tts: Arc::new(UnusedTts),
            llm: Arc::new(UnusedLlm),
            router: Arc::new(ModelRouter::new(
                BackendCatalog::default(),
                RegionProfile::default(),
            )),
            breakers: Arc::new(BreakerRegistry::new(BreakerConfig::default())),
            profiler: Arc::new(LatencyProfiler::default()),
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            CallManager::new(deps, Settings::default(), events_tx),
            events_rx,
        )
    }

    fn region() -> CallerRegion {
        CallerRegion::new("eu-central").unwrap()
    }

    #[tokio::test]
    async fn start_call_registers_a_pipeline() {
        let (manager, _events) = manager();
        let handle = manager.start_call(CallId::new(), region());
        assert_eq!(manager.active_calls(), 1);
        drop(handle);
    }

    #[tokio::test]
    async fn dropping_frames_ends_call_gracefully() {
        let (manager, _events) = manager();
        let handle = manager.start_call(CallId::new(), region());
        drop(handle);

        // The pipeline sees the closed ingress and exits
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(manager.active_calls(), 0);
    }

    #[tokio::test]
    async fn end_call_aborts_immediately() {
        let (manager, _events) = manager();
        let handle = manager.start_call(CallId::new(), region());

        manager.end_call(handle.call_id).unwrap();
        assert_eq!(manager.active_calls(), 0);
    }

    #[tokio::test]
    async fn end_call_twice_reports_not_found() {
        let (manager, _events) = manager();
        let handle = manager.start_call(CallId::new(), region());

        manager.end_call(handle.call_id).unwrap();
        let result = manager.end_call(handle.call_id);
        assert!(matches!(result, Err(ApplicationError::CallNotFound(_))));
    }

    #[tokio::test]
    async fn shutdown_aborts_all_calls() {
        let (manager, _events) = manager();
        let _h1 = manager.start_call(CallId::new(), region());
        let _h2 = manager.start_call(CallId::new(), region());
        assert_eq!(manager.active_calls(), 2);

        manager.shutdown();
        assert_eq!(manager.active_calls(), 0);
    }
}
