//! End-to-end pipeline scenarios with mocked stage adapters
//!
//! Covers the conversational loop without any network: clean-speech
//! latency, breaker-driven degradation across turns, reasoning
//! isolation, and synthesis ordering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use application::services::call_manager::CallManager;
use application::services::pipeline_service::PipelineDeps;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use domain::{
    AudioFrame, CallId, CallerRegion, CircuitState, FrameEncoding, PipelineEvent,
    ProcessingLocation, RegionProfile, StreamSegment,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use ai_core::{
    BackendCatalog, DeltaStream, GenerationBackend, GenerationDelta, GenerationRequest,
    InferenceError, ModelRouter, RouterPolicy,
};
use ai_speech::{SpeechError, SpeechToText, SttStream, SynthesisStream, TextToSpeech, TranscriptDelta};
use domain::CostPriority;
use infrastructure::adapters::BreakerConfig;
use infrastructure::config::Settings;
use infrastructure::{BreakerRegistry, LatencyProfiler};

// ── Mock adapters ──────────────────────────────────────────────────

/// STT that transcribes every stream to a fixed phrase, finalizing
/// after five frames, each delta ~immediately
struct ScriptedStt {
    transcript: String,
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn open_stream(
        &self,
        _call_id: CallId,
        _encoding: FrameEncoding,
    ) -> Result<SttStream, SpeechError> {
        let transcript = self.transcript.clone();
        let (frame_tx, mut frame_rx) = mpsc::channel::<AudioFrame>(64);
        let (delta_tx, delta_rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut frames = 0u32;
            while frame_rx.recv().await.is_some() {
                frames += 1;
                let delta = if frames >= 5 {
                    TranscriptDelta::final_result(transcript.clone(), Some(0.93))
                } else {
                    TranscriptDelta::partial(transcript.clone(), Some(0.6))
                };
                let done = delta.is_final;
                if delta_tx.send(Ok(delta)).await.is_err() || done {
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
        "scripted-stt"
    }
}

/// Generation mock: scripted deltas with a 20ms stage delay, with an
/// optional set of backends that always fail transiently
struct ScriptedLlm {
    deltas: Vec<GenerationDelta>,
    failing_backend: Option<String>,
}

impl ScriptedLlm {
    fn answering(text: &str) -> Self {
        Self {
            deltas: vec![
                GenerationDelta::Answer(text.to_string()),
                GenerationDelta::Done,
            ],
            failing_backend: None,
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedLlm {
    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream, InferenceError> {
        if let Some(ref failing) = self.failing_backend {
            if request.decision.backend_id == *failing {
                return Err(InferenceError::InterTokenTimeout(100));
            }
        }
        let deltas = self.deltas.clone();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            for delta in deltas {
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn health_check(&self) -> Result<bool, InferenceError> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted-llm"
    }
}

/// TTS mock echoing segment text as audio bytes after a delay
///
/// `staggered` makes earlier segments slower, forcing out-of-order
/// completion.
struct EchoTts {
    base_delay_ms: u64,
    staggered: bool,
}

#[async_trait]
impl TextToSpeech for EchoTts {
    async fn synthesize(&self, segment: &StreamSegment) -> Result<SynthesisStream, SpeechError> {
        let delay = if self.staggered {
            self.base_delay_ms + u64::from(3u32.saturating_sub(segment.index)) * 25
        } else {
            self.base_delay_ms
        };
        let payload = Bytes::from(segment.text.clone().into_bytes());
        let chunk = async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(payload)
        };
        Ok(futures::stream::once(chunk).boxed())
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "echo-tts"
    }

    fn default_voice(&self) -> &str {
        "echo"
    }
}

// ── Harness ────────────────────────────────────────────────────────

struct Harness {
    manager: CallManager,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    breakers: Arc<BreakerRegistry>,
    profiler: Arc<LatencyProfiler>,
}

fn harness(
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn GenerationBackend>,
    tts: Arc<dyn TextToSpeech>,
    settings: Settings,
) -> Harness {
    let breakers = Arc::new(BreakerRegistry::new(settings.breaker.clone()));
    let profiler = Arc::new(LatencyProfiler::default());
    let deps = PipelineDeps {
        stt,
        tts,
        llm,
        router: Arc::new(ModelRouter::new(
            BackendCatalog::default(),
            RegionProfile::default(),
        )),
        breakers: Arc::clone(&breakers),
        profiler: Arc::clone(&profiler),
    };
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    Harness {
        manager: CallManager::new(deps, settings, events_tx),
        events: events_rx,
        breakers,
        profiler,
    }
}

fn region() -> CallerRegion {
    CallerRegion::new("eu-central").unwrap()
}

fn speech_frame(seq: u64) -> AudioFrame {
    AudioFrame::new(vec![0x80; 160], seq, Utc::now(), FrameEncoding::Mulaw8k).unwrap()
}

fn silence_frame(seq: u64) -> AudioFrame {
    AudioFrame::new(vec![0xFF; 160], seq, Utc::now(), FrameEncoding::Mulaw8k).unwrap()
}

/// Feed one utterance: enough speech to trip the VAD and enough extra
/// frames for the scripted STT to finalize
async fn speak_utterance(frames: &mpsc::Sender<AudioFrame>, start_seq: u64) -> u64 {
    let mut seq = start_seq;
    for _ in 0..4 {
        frames.send(speech_frame(seq)).await.unwrap();
        seq += 1;
    }
    for _ in 0..8 {
        frames.send(silence_frame(seq)).await.unwrap();
        seq += 1;
    }
    seq
}

async fn collect_turn_audio(
    outbound: &mut mpsc::Receiver<application::OutboundAudio>,
    deadline: Duration,
) -> Vec<application::OutboundAudio> {
    let mut chunks = Vec::new();
    while let Ok(Some(chunk)) = tokio::time::timeout(deadline, outbound.recv()).await {
        chunks.push(chunk);
    }
    chunks
}

fn drain_events(events: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn clean_speech_turn_completes_within_budget() {
    let mut h = harness(
        Arc::new(ScriptedStt {
            transcript: "what are your opening hours".to_string(),
        }),
        Arc::new(ScriptedLlm::answering("We are open nine to five.")),
        Arc::new(EchoTts {
            base_delay_ms: 20,
            staggered: false,
        }),
        Settings::default(),
    );

    let mut handle = h.manager.start_call(CallId::new(), region());
    let sent_all = {
        speak_utterance(&handle.frames, 0).await;
        Instant::now()
    };

    let first = tokio::time::timeout(Duration::from_millis(300), handle.outbound.recv())
        .await
        .expect("turn must complete inside the latency budget")
        .expect("outbound must produce audio");
    let elapsed = sent_all.elapsed();
    assert!(
        elapsed < Duration::from_millis(300),
        "first audio took {elapsed:?}"
    );
    assert_eq!(first.turn_index, 0);
    assert_eq!(first.segment_index, 0);
    assert_eq!(&first.payload[..], b"We are open nine to five.");

    // Settle, then check the event log
    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = drain_events(&mut h.events);

    let finalized = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::UtteranceFinalized { .. }))
        .count();
    assert_eq!(finalized, 1);

    let selections: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ModelSelected { decision, .. } => Some(decision),
            _ => None,
        })
        .collect();
    assert_eq!(selections.len(), 1, "exactly one decision per turn");
    assert!(!selections[0].degraded);

    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PipelineEvent::TurnDegraded { .. })),
        "clean turn must not be degraded"
    );

    // The profiler saw every stage
    assert!(h.profiler.stats("stt.stream_open").is_some());
    assert!(h.profiler.stats("stt.first_partial").is_some());
    assert!(h.profiler.stats("llm.stream_open").is_some());
    assert!(h.profiler.stats("tts.synthesize").is_some());
}

#[tokio::test]
async fn failing_capable_backend_opens_breaker_and_falls_back() {
    // Quality-first routing sends every turn to the most capable
    // backend; that backend always times out.
    let settings = Settings {
        router: RouterPolicy {
            cost_priority: CostPriority::QualityFirst,
            latency_target_ms: 400,
            ..RouterPolicy::default()
        },
        breaker: BreakerConfig {
            failure_threshold: 3,
            window_ms: 60_000,
            cooldown_ms: 60_000,
        },
        ..Settings::default()
    };
    let mut h = harness(
        Arc::new(ScriptedStt {
            transcript: "hello there".to_string(),
        }),
        Arc::new(ScriptedLlm {
            deltas: vec![
                GenerationDelta::Answer("Certainly.".to_string()),
                GenerationDelta::Done,
            ],
            failing_backend: Some("frontier-1".to_string()),
        }),
        Arc::new(EchoTts {
            base_delay_ms: 5,
            staggered: false,
        }),
        settings,
    );

    let mut handle = h.manager.start_call(CallId::new(), region());

    let mut seq = 0;
    for _ in 0..4 {
        seq = speak_utterance(&handle.frames, seq).await;
        // Let the turn (including its fallback attempt) finish
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    let events = drain_events(&mut h.events);
    let selections: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ModelSelected { decision, .. } => Some(decision),
            _ => None,
        })
        .collect();
    assert_eq!(selections.len(), 4);

    // Early turns target the capable backend
    assert_eq!(selections[0].backend_id, "frontier-1");

    // Both cloud locations accumulate failures (initial + fallback per
    // turn); by the fourth turn the breaker has them open and routing
    // lands on an edge-capable lesser backend.
    assert_eq!(
        h.breakers
            .state("generation", &ProcessingLocation::cloud("eu-central")),
        CircuitState::Open
    );
    assert_ne!(
        selections[3].backend_id, "frontier-1",
        "fourth turn must route around the broken backend"
    );

    // The failed turns are flagged
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PipelineEvent::TurnDegraded { .. })),
        "failed turns must be flagged degraded"
    );

    // The caller hears something every turn: apologies early, the
    // fallback answer once routing recovers.
    let audio = collect_turn_audio(&mut handle.outbound, Duration::from_millis(100)).await;
    assert!(!audio.is_empty());
    let last_text = String::from_utf8_lossy(&audio.last().unwrap().payload).to_string();
    assert_eq!(last_text, "Certainly.");
}

#[tokio::test]
async fn reasoning_deltas_never_reach_synthesis() {
    let mut h = harness(
        Arc::new(ScriptedStt {
            transcript: "please troubleshoot my connection".to_string(),
        }),
        Arc::new(ScriptedLlm {
            deltas: vec![
                GenerationDelta::Reasoning("internal chain of thought".to_string()),
                GenerationDelta::Answer("Restart the router. ".to_string()),
                GenerationDelta::Reasoning("further deliberation".to_string()),
                GenerationDelta::Answer("Then check the cable.".to_string()),
                GenerationDelta::Done,
            ],
            failing_backend: None,
        }),
        Arc::new(EchoTts {
            base_delay_ms: 5,
            staggered: false,
        }),
        Settings::default(),
    );

    let mut handle = h.manager.start_call(CallId::new(), region());
    speak_utterance(&handle.frames, 0).await;

    let audio = collect_turn_audio(&mut handle.outbound, Duration::from_millis(300)).await;
    assert!(!audio.is_empty());

    let spoken: String = audio
        .iter()
        .map(|chunk| String::from_utf8_lossy(&chunk.payload).to_string())
        .collect::<Vec<_>>()
        .join(" ");

    assert!(spoken.contains("Restart the router."));
    assert!(spoken.contains("Then check the cable."));
    assert!(
        !spoken.contains("chain of thought") && !spoken.contains("deliberation"),
        "reasoning content must never be spoken: {spoken}"
    );

    // Reasoning is still visible to telemetry via the turn's latency
    // records; the event log itself carries no reasoning text either.
    let events = drain_events(&mut h.events);
    for event in &events {
        let json = serde_json::to_string(event).unwrap();
        assert!(!json.contains("chain of thought"), "leaked into {json}");
    }
}

#[tokio::test]
async fn synthesis_output_is_reordered_by_segment_index() {
    // Three sentences become three segments; the staggered TTS makes
    // earlier segments finish later.
    let mut h = harness(
        Arc::new(ScriptedStt {
            transcript: "tell me three things".to_string(),
        }),
        Arc::new(ScriptedLlm::answering(
            "First thing. Second thing. Third thing. ",
        )),
        Arc::new(EchoTts {
            base_delay_ms: 5,
            staggered: true,
        }),
        Settings::default(),
    );

    let mut handle = h.manager.start_call(CallId::new(), region());
    speak_utterance(&handle.frames, 0).await;

    let audio = collect_turn_audio(&mut handle.outbound, Duration::from_millis(400)).await;
    let indices: Vec<u32> = audio.iter().map(|c| c.segment_index).collect();
    assert_eq!(
        indices,
        vec![0, 1, 2],
        "audio must leave in segment-index order"
    );

    let texts: Vec<String> = audio
        .iter()
        .map(|c| String::from_utf8_lossy(&c.payload).to_string())
        .collect();
    assert_eq!(texts, vec!["First thing.", "Second thing.", "Third thing."]);

    drain_events(&mut h.events);
}

#[tokio::test]
async fn hangup_mid_turn_ends_the_call_cleanly() {
    let mut h = harness(
        Arc::new(ScriptedStt {
            transcript: "a question".to_string(),
        }),
        Arc::new(ScriptedLlm::answering("An answer.")),
        Arc::new(EchoTts {
            base_delay_ms: 200,
            staggered: false,
        }),
        Settings::default(),
    );

    let handle = h.manager.start_call(CallId::new(), region());
    speak_utterance(&handle.frames, 0).await;

    // Hang up while synthesis is still sleeping
    h.manager.end_call(handle.call_id).unwrap();
    assert_eq!(h.manager.active_calls(), 0);
    drain_events(&mut h.events);
}
