//! Per-call pipeline orchestration
//!
//! One `CallPipeline` per active call, owning all per-call state. The
//! ingest loop runs VAD over arriving frames, fills the bounded buffer,
//! and drains it into the transcription stream at the stream's own
//! pace. A finalized utterance starts a turn: the router picks a
//! backend, generation streams through the segmenter, and segments are
//! synthesized concurrently with the output re-ordered by segment
//! index. Frames keep arriving and buffering while a turn is in
//! flight.
//!
//! Failure handling is exhaustive over the closed taxonomy: Transient
//! gets one same-turn fallback on the next-best candidate, Degraded
//! continues on the lesser path, Permanent ends the turn with the
//! spoken apology. A failed turn never tears down the call.

use std::sync::Arc;
use std::time::Instant;

use ai_core::router::GENERATION_SERVICE;
use ai_core::{
    CallContext, GenerationBackend, GenerationDelta, GenerationRequest, ModelRouter, RouterPolicy,
    ServiceHealth,
};
use ai_speech::{
    SpeechError, SpeechToText, TextToSpeech, VadConfig, VadEvent, VoiceActivityDetector,
};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use domain::{
    AudioFrame, CallId, CallerRegion, FrameEncoding, LatencyMeasurement, ModelSelectionDecision,
    PipelineEvent, ProcessingLocation, SegmentBoundary, StreamSegment, Utterance,
};
use futures::StreamExt;
use infrastructure::config::{BufferSettings, Settings};
use infrastructure::{BreakerRegistry, LatencyProfiler};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::buffer::FrameBuffer;
use crate::error::{ApplicationError, StageFailure};
use crate::segmenter::ResponseSegmenter;
use crate::reorder::SegmentReorderBuffer;

/// Service name transcription breakers are keyed under
pub const TRANSCRIPTION_SERVICE: &str = "transcription";
/// Service name synthesis breakers are keyed under
pub const SYNTHESIS_SERVICE: &str = "synthesis";

/// One chunk of outbound call audio
#[derive(Debug, Clone)]
pub struct OutboundAudio {
    /// Call this audio belongs to
    pub call_id: CallId,
    /// Turn the audio answers
    pub turn_index: u32,
    /// Segment position within the turn
    pub segment_index: u32,
    /// Synthesized audio payload
    pub payload: Bytes,
}

/// Shared stage implementations and process-wide state
#[derive(Clone)]
pub struct PipelineDeps {
    /// Transcription port
    pub stt: Arc<dyn SpeechToText>,
    /// Synthesis port
    pub tts: Arc<dyn TextToSpeech>,
    /// Generation port
    pub llm: Arc<dyn GenerationBackend>,
    /// Adaptive router
    pub router: Arc<ModelRouter>,
    /// Breaker registry shared across calls
    pub breakers: Arc<BreakerRegistry>,
    /// Latency aggregator shared across calls
    pub profiler: Arc<LatencyProfiler>,
}

impl std::fmt::Debug for PipelineDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDeps").finish_non_exhaustive()
    }
}

/// Per-call configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where the caller's audio enters the system
    pub region: CallerRegion,
    /// Frame encoding the ingress delivers
    pub encoding: FrameEncoding,
    /// VAD parameters
    pub vad: VadConfig,
    /// Frame buffer settings
    pub buffer: BufferSettings,
    /// Routing policy for this caller
    pub router_policy: RouterPolicy,
    /// Spoken when a turn fails despite fallback
    pub apology_phrase: String,
    /// Segmenter forced-flush threshold
    pub max_segment_chars: usize,
}

impl PipelineConfig {
    /// Build a per-call config from the process settings
    pub fn from_settings(settings: &Settings, region: CallerRegion) -> Self {
        Self {
            region,
            encoding: FrameEncoding::Mulaw8k,
            vad: settings.vad.clone(),
            buffer: settings.buffer.clone(),
            router_policy: settings.router.clone(),
            apology_phrase: settings.apology_phrase.clone(),
            max_segment_chars: 240,
        }
    }
}

/// An utterance being captured: its transcription stream and state
struct Capture {
    stream: ai_speech::SttStream,
    utterance: Utterance,
    stt_location: ProcessingLocation,
    opened_at: chrono::DateTime<Utc>,
    opened_instant: Instant,
    saw_first_partial: bool,
}

enum CaptureEvent {
    Delta(ai_speech::TranscriptDelta),
    Failed(SpeechError),
    Closed,
}

/// The per-call pipeline instance
pub struct CallPipeline {
    call_id: CallId,
    config: PipelineConfig,
    deps: PipelineDeps,
    events: mpsc::UnboundedSender<PipelineEvent>,
    outbound: mpsc::Sender<OutboundAudio>,
}

impl std::fmt::Debug for CallPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPipeline")
            .field("call_id", &self.call_id)
            .finish_non_exhaustive()
    }
}

impl CallPipeline {
    /// Create a pipeline for one call
    pub fn new(
        call_id: CallId,
        config: PipelineConfig,
        deps: PipelineDeps,
        events: mpsc::UnboundedSender<PipelineEvent>,
        outbound: mpsc::Sender<OutboundAudio>,
    ) -> Self {
        Self {
            call_id,
            config,
            deps,
            events,
            outbound,
        }
    }

    /// Run the ingest loop until the ingress hangs up
    ///
    /// Frames are processed in strict arrival order. The loop never
    /// blocks on a stage: transcription drains the buffer at its own
    /// pace and turns run as their own tasks while audio keeps
    /// arriving.
    pub async fn run(
        self,
        mut frames: mpsc::Receiver<AudioFrame>,
    ) -> Result<(), ApplicationError> {
        info!(call_id = %self.call_id, region = %self.config.region, "Call pipeline started");

        let mut vad = VoiceActivityDetector::new(self.config.vad.clone());
        let mut buffer = FrameBuffer::new(self.config.buffer.clone());
        let mut capture: Option<Capture> = None;
        let mut current_turn: Option<JoinHandle<()>> = None;
        let mut turn_index: u32 = 0;
        let mut last_sequence: Option<u64> = None;

        loop {
            tokio::select! {
                maybe_frame = frames.recv() => {
                    let Some(frame) = maybe_frame else {
                        debug!(call_id = %self.call_id, "Ingress closed, ending call");
                        break;
                    };
                    if !note_sequence(self.call_id, &mut last_sequence, &frame) {
                        continue;
                    }

                    let classification = vad.classify(&frame);
                    match classification.event {
                        Some(VadEvent::SpeechStarted) => {
                            if capture.is_none() {
                                match self.open_capture(turn_index).await {
                                    Ok(new_capture) => capture = Some(new_capture),
                                    Err(failure) => {
                                        self.conclude_failed_turn(turn_index, &failure).await;
                                        vad.reset();
                                    },
                                }
                            }
                        },
                        Some(VadEvent::UtteranceCandidateEnded) => {
                            if let Some(finished) = capture.take() {
                                buffer.clear();
                                vad.reset();
                                self.seal_and_start_turn(
                                    finished.utterance,
                                    &mut turn_index,
                                    &mut current_turn,
                                );
                            }
                        },
                        None => {},
                    }

                    if capture.is_some() {
                        buffer.enqueue(frame).await;
                        drain_buffer(&mut buffer, capture.as_ref());
                    }
                },
                event = next_capture_event(capture.as_mut()) => {
                    match event {
                        CaptureEvent::Delta(delta) => {
                            let finished = self.apply_delta(capture.as_mut(), &delta);
                            if finished {
                                if let Some(finished) = capture.take() {
                                    self.deps.breakers.record_success(
                                        TRANSCRIPTION_SERVICE,
                                        &finished.stt_location,
                                    );
                                    buffer.clear();
                                    vad.reset();
                                    self.seal_and_start_turn(
                                        finished.utterance,
                                        &mut turn_index,
                                        &mut current_turn,
                                    );
                                }
                            } else {
                                drain_buffer(&mut buffer, capture.as_ref());
                            }
                        },
                        CaptureEvent::Failed(err) => {
                            if let Some(failed) = capture.take() {
                                self.deps.breakers.record_failure(
                                    TRANSCRIPTION_SERVICE,
                                    &failed.stt_location,
                                );
                                let failure = StageFailure::from_speech("stt", &err);
                                self.conclude_failed_turn(turn_index, &failure).await;
                                buffer.clear();
                                vad.reset();
                            }
                        },
                        CaptureEvent::Closed => {
                            capture = None;
                        },
                    }
                },
            }
        }

        // Hangup: abort the in-flight turn rather than awaiting it and
        // discard all buffers.
        if let Some(turn) = current_turn {
            turn.abort();
        }
        info!(call_id = %self.call_id, turns = turn_index, "Call pipeline stopped");
        Ok(())
    }

    /// Open a transcription stream through the breaker and profiler
    async fn open_capture(&self, turn_index: u32) -> Result<Capture, StageFailure> {
        let stt_location = self.stt_location();
        self.deps
            .breakers
            .try_acquire(TRANSCRIPTION_SERVICE, &stt_location)
            .map_err(|e| StageFailure::from_breaker("stt", &e))?;

        let opened = self
            .deps
            .profiler
            .time(
                "stt.stream_open",
                self.call_id,
                self.deps.stt.open_stream(self.call_id, self.config.encoding),
            )
            .await;

        match opened {
            Ok(stream) => {
                debug!(call_id = %self.call_id, turn_index, "Transcription stream opened");
                Ok(Capture {
                    stream,
                    utterance: Utterance::new(self.call_id, turn_index),
                    stt_location,
                    opened_at: Utc::now(),
                    opened_instant: Instant::now(),
                    saw_first_partial: false,
                })
            },
            Err(e) => {
                self.deps
                    .breakers
                    .record_failure(TRANSCRIPTION_SERVICE, &stt_location);
                Err(StageFailure::from_speech("stt", &e))
            },
        }
    }

    /// Apply a transcript delta; true when the utterance was sealed
    fn apply_delta(
        &self,
        capture: Option<&mut Capture>,
        delta: &ai_speech::TranscriptDelta,
    ) -> bool {
        let Some(capture) = capture else {
            return false;
        };
        if !capture.saw_first_partial {
            capture.saw_first_partial = true;
            let elapsed =
                i64::try_from(capture.opened_instant.elapsed().as_millis()).unwrap_or(i64::MAX);
            self.deps.profiler.record(&LatencyMeasurement::new(
                "stt.first_partial",
                self.call_id,
                capture.opened_at,
                capture.opened_at + chrono::Duration::milliseconds(elapsed),
            ));
        }
        if capture
            .utterance
            .apply_delta(&delta.text, delta.confidence)
            .is_err()
        {
            return false;
        }
        if delta.is_final {
            if capture.utterance.finalize().is_err() {
                return false;
            }
            return true;
        }
        false
    }

    /// Seal bookkeeping done; emit events and run the turn as a task
    fn seal_and_start_turn(
        &self,
        mut utterance: Utterance,
        turn_index: &mut u32,
        current_turn: &mut Option<JoinHandle<()>>,
    ) {
        // The VAD silence timeout seals an utterance the service never
        // finalized; at-most-once is guarded by the entity itself.
        if !utterance.is_final() && utterance.finalize().is_err() {
            return;
        }
        if utterance.text().trim().is_empty() {
            debug!(call_id = %self.call_id, "Empty utterance discarded");
            return;
        }

        // A new finalized utterance while the previous response is
        // still streaming is barge-in: the caller wins.
        if let Some(previous) = current_turn.take() {
            if previous.is_finished() {
                drop(previous);
            } else {
                warn!(call_id = %self.call_id, "Barge-in, aborting previous turn");
                previous.abort();
            }
        }

        let _ = self.events.send(PipelineEvent::UtteranceFinalized {
            call_id: self.call_id,
            turn_index: utterance.turn_index(),
            text: utterance.text().to_string(),
            confidence: utterance.confidence(),
        });

        let driver = TurnDriver {
            call_id: self.call_id,
            config: self.config.clone(),
            deps: self.deps.clone(),
            events: self.events.clone(),
            outbound: self.outbound.clone(),
            degraded_emitted: std::sync::atomic::AtomicBool::new(false),
        };
        *current_turn = Some(tokio::spawn(async move {
            driver.drive(utterance).await;
        }));
        *turn_index += 1;
    }

    /// A turn failed before generation could even start
    async fn conclude_failed_turn(&self, turn_index: u32, failure: &StageFailure) {
        warn!(call_id = %self.call_id, error = %failure, "Turn failed before generation");
        let driver = TurnDriver {
            call_id: self.call_id,
            config: self.config.clone(),
            deps: self.deps.clone(),
            events: self.events.clone(),
            outbound: self.outbound.clone(),
            degraded_emitted: std::sync::atomic::AtomicBool::new(false),
        };
        driver.speak_apology(turn_index, &failure.to_string()).await;
    }

    /// Speech services run at the caller's nearest edge
    fn stt_location(&self) -> ProcessingLocation {
        ProcessingLocation::edge(self.config.region.code().to_string())
    }
}

/// Frame sequence bookkeeping: gaps are logged, stale frames dropped
fn note_sequence(call_id: CallId, last: &mut Option<u64>, frame: &AudioFrame) -> bool {
    let sequence = frame.sequence();
    match *last {
        Some(previous) if sequence <= previous => {
            warn!(call_id = %call_id, sequence, previous, "Stale frame dropped");
            false
        },
        Some(previous) => {
            if sequence > previous + 1 {
                debug!(
                    call_id = %call_id,
                    missing = sequence - previous - 1,
                    "Sequence gap tolerated"
                );
                metrics::counter!("frame_gaps_total").increment(1);
            }
            *last = Some(sequence);
            true
        },
        None => {
            *last = Some(sequence);
            true
        },
    }
}

/// Drain buffered frames into the transcription stream at its pace
fn drain_buffer(buffer: &mut FrameBuffer, capture: Option<&Capture>) {
    let Some(capture) = capture else { return };
    while let Some(frame) = buffer.pop() {
        match capture.stream.try_push(frame) {
            ai_speech::TryPush::Accepted => {},
            ai_speech::TryPush::Full(frame) => {
                buffer.requeue_front(frame);
                break;
            },
            ai_speech::TryPush::Closed => break,
        }
    }
}

/// Next transcription event, or pending forever without a capture
async fn next_capture_event(capture: Option<&mut Capture>) -> CaptureEvent {
    match capture {
        Some(capture) => match capture.stream.next_delta().await {
            Some(Ok(delta)) => CaptureEvent::Delta(delta),
            Some(Err(err)) => CaptureEvent::Failed(err),
            None => CaptureEvent::Closed,
        },
        None => std::future::pending().await,
    }
}

// ── Turn driving ───────────────────────────────────────────────────

/// Masks one (service, location) pair as open on top of another view
///
/// Used for the same-turn fallback: re-selection must not land on the
/// pair that just failed, even before its breaker trips.
struct MaskedPair<'a> {
    inner: &'a (dyn ServiceHealth + Send + Sync),
    location: ProcessingLocation,
}

impl ServiceHealth for MaskedPair<'_> {
    fn is_open(&self, service: &str, location: &ProcessingLocation) -> bool {
        (service == GENERATION_SERVICE && *location == self.location)
            || self.inner.is_open(service, location)
    }
}

/// Owns one conversational turn from decision to last audio chunk
struct TurnDriver {
    call_id: CallId,
    config: PipelineConfig,
    deps: PipelineDeps,
    events: mpsc::UnboundedSender<PipelineEvent>,
    outbound: mpsc::Sender<OutboundAudio>,
    degraded_emitted: std::sync::atomic::AtomicBool,
}

impl TurnDriver {
    async fn drive(self, utterance: Utterance) {
        let turn_index = utterance.turn_index();
        let context = CallContext {
            region: self.config.region.clone(),
            turns_so_far: turn_index,
        };

        let decision = self.deps.router.select(
            &utterance,
            &context,
            &self.config.router_policy,
            self.deps.breakers.as_ref(),
        );
        let _ = self.events.send(PipelineEvent::ModelSelected {
            call_id: self.call_id,
            turn_index,
            decision: decision.clone(),
        });
        if decision.degraded {
            self.emit_degraded(turn_index, "all generation candidates open");
        }

        match self.attempt_generation(&utterance, &decision).await {
            Ok(()) => {},
            Err(StageFailure::Permanent { stage, reason }) => {
                warn!(call_id = %self.call_id, stage, reason, "Permanent turn failure");
                self.speak_apology(turn_index, &reason).await;
            },
            Err(failure) => {
                // Transient or Degraded: one same-turn fallback on the
                // next-best candidate, then the apology.
                warn!(call_id = %self.call_id, error = %failure, "Generation failed, re-selecting");
                let masked = MaskedPair {
                    inner: self.deps.breakers.as_ref(),
                    location: decision.processing_location.clone(),
                };
                let retry_decision = self.deps.router.select(
                    &utterance,
                    &context,
                    &self.config.router_policy,
                    &masked,
                );
                self.emit_degraded(turn_index, "same-turn fallback after generation failure");

                if let Err(retry_failure) =
                    self.attempt_generation(&utterance, &retry_decision).await
                {
                    warn!(
                        call_id = %self.call_id,
                        error = %retry_failure,
                        "Fallback attempt failed"
                    );
                    self.speak_apology(turn_index, &retry_failure.to_string()).await;
                }
            },
        }
    }

    /// One generation attempt: stream, segment, synthesize, reorder
    async fn attempt_generation(
        &self,
        utterance: &Utterance,
        decision: &ModelSelectionDecision,
    ) -> Result<(), StageFailure> {
        let location = &decision.processing_location;
        self.deps
            .breakers
            .try_acquire(GENERATION_SERVICE, location)
            .map_err(|e| StageFailure::from_breaker("llm", &e))?;

        let request =
            GenerationRequest::from_utterance(utterance.text().to_string(), decision.clone());
        let opened = self
            .deps
            .profiler
            .time("llm.stream_open", self.call_id, self.deps.llm.stream(request))
            .await;

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                self.deps.breakers.record_failure(GENERATION_SERVICE, location);
                return Err(StageFailure::from_inference("llm", &e));
            },
        };

        let turn_index = utterance.turn_index();
        let mut segmenter = ResponseSegmenter::new(self.config.max_segment_chars);
        let mut reorder = SegmentReorderBuffer::new();
        let mut synthesis: JoinSet<(u32, Result<Bytes, StageFailure>)> = JoinSet::new();
        let opened_at = Utc::now();
        let opened_instant = Instant::now();
        let mut first_answer_seen = false;
        let mut reasoning_chars: u64 = 0;

        loop {
            tokio::select! {
                maybe_delta = stream.next() => {
                    match maybe_delta {
                        Some(Ok(GenerationDelta::Answer(text))) => {
                            if !first_answer_seen {
                                first_answer_seen = true;
                                self.record_first_token(opened_at, opened_instant);
                            }
                            for segment in segmenter.push_delta(&text) {
                                self.spawn_synthesis(&mut synthesis, segment, location.clone());
                            }
                        },
                        Some(Ok(GenerationDelta::Reasoning(text))) => {
                            reasoning_chars += text.len() as u64;
                        },
                        Some(Ok(GenerationDelta::Done)) | None => break,
                        Some(Err(e)) => {
                            self.deps.breakers.record_failure(GENERATION_SERVICE, location);
                            synthesis.abort_all();
                            return Err(StageFailure::from_inference("llm", &e));
                        },
                    }
                },
                Some(joined) = synthesis.join_next(), if !synthesis.is_empty() => {
                    self.handle_synthesis_result(turn_index, &mut reorder, joined).await;
                },
            }
        }

        if let Some(tail) = segmenter.finish() {
            self.spawn_synthesis(&mut synthesis, tail, location.clone());
        }
        self.deps.breakers.record_success(GENERATION_SERVICE, location);

        if reasoning_chars > 0 {
            debug!(
                call_id = %self.call_id,
                reasoning_chars,
                "Reasoning recorded, not forwarded to synthesis"
            );
            metrics::counter!("reasoning_chars_total").increment(reasoning_chars);
        }

        while let Some(joined) = synthesis.join_next().await {
            self.handle_synthesis_result(turn_index, &mut reorder, joined).await;
        }
        Ok(())
    }

    fn record_first_token(&self, opened_at: chrono::DateTime<Utc>, opened_instant: Instant) {
        let elapsed = i64::try_from(opened_instant.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.deps.profiler.record(&LatencyMeasurement::new(
            "llm.first_token",
            self.call_id,
            opened_at,
            opened_at + chrono::Duration::milliseconds(elapsed),
        ));
    }

    /// Kick off synthesis for one segment; several may be in flight
    fn spawn_synthesis(
        &self,
        synthesis: &mut JoinSet<(u32, Result<Bytes, StageFailure>)>,
        segment: StreamSegment,
        location: ProcessingLocation,
    ) {
        let tts = Arc::clone(&self.deps.tts);
        let breakers = Arc::clone(&self.deps.breakers);
        let profiler = Arc::clone(&self.deps.profiler);
        let call_id = self.call_id;

        synthesis.spawn(async move {
            let index = segment.index;
            let result =
                synthesize_segment(&tts, &breakers, &profiler, call_id, &segment, &location).await;
            (index, result)
        });
    }

    async fn handle_synthesis_result(
        &self,
        turn_index: u32,
        reorder: &mut SegmentReorderBuffer,
        joined: Result<(u32, Result<Bytes, StageFailure>), tokio::task::JoinError>,
    ) {
        let released = match joined {
            Ok((index, Ok(audio))) => reorder.offer(index, audio),
            Ok((index, Err(failure))) => {
                warn!(
                    call_id = %self.call_id,
                    segment = index,
                    error = %failure,
                    "Segment synthesis failed, skipping"
                );
                reorder.skip(index)
            },
            Err(join_error) => {
                warn!(call_id = %self.call_id, error = %join_error, "Synthesis task died");
                return;
            },
        };

        for (segment_index, payload) in released {
            let chunk = OutboundAudio {
                call_id: self.call_id,
                turn_index,
                segment_index,
                payload,
            };
            if self.outbound.send(chunk).await.is_err() {
                debug!(call_id = %self.call_id, "Outbound sink gone");
                return;
            }
        }
    }

    /// Any failed turn ends with speech, never with silence
    async fn speak_apology(&self, turn_index: u32, reason: &str) {
        self.emit_degraded(turn_index, reason);

        let segment = StreamSegment::new(
            0,
            self.config.apology_phrase.clone(),
            SegmentBoundary::EndOfTurn,
        );
        let location = ProcessingLocation::edge(self.config.region.code().to_string());
        match synthesize_segment(
            &self.deps.tts,
            &self.deps.breakers,
            &self.deps.profiler,
            self.call_id,
            &segment,
            &location,
        )
        .await
        {
            Ok(payload) => {
                let _ = self
                    .outbound
                    .send(OutboundAudio {
                        call_id: self.call_id,
                        turn_index,
                        segment_index: 0,
                        payload,
                    })
                    .await;
            },
            Err(failure) => {
                warn!(call_id = %self.call_id, error = %failure, "Even the apology failed");
            },
        }
    }

    /// Flag the turn as degraded, at most once
    fn emit_degraded(&self, turn_index: u32, reason: &str) {
        if self
            .degraded_emitted
            .swap(true, std::sync::atomic::Ordering::Relaxed)
        {
            return;
        }
        let _ = self.events.send(PipelineEvent::TurnDegraded {
            call_id: self.call_id,
            turn_index,
            reason: reason.to_string(),
        });
    }
}

/// Synthesize one segment behind its breaker, collecting all chunks
async fn synthesize_segment(
    tts: &Arc<dyn TextToSpeech>,
    breakers: &BreakerRegistry,
    profiler: &LatencyProfiler,
    call_id: CallId,
    segment: &StreamSegment,
    location: &ProcessingLocation,
) -> Result<Bytes, StageFailure> {
    breakers
        .try_acquire(SYNTHESIS_SERVICE, location)
        .map_err(|e| StageFailure::from_breaker("tts", &e))?;

    let opened = profiler
        .time("tts.synthesize", call_id, tts.synthesize(segment))
        .await;

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            breakers.record_failure(SYNTHESIS_SERVICE, location);
            return Err(StageFailure::from_speech("tts", &e));
        },
    };

    let mut audio = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => audio.extend_from_slice(&bytes),
            Err(e) => {
                breakers.record_failure(SYNTHESIS_SERVICE, location);
                return Err(StageFailure::from_speech("tts", &e));
            },
        }
    }

    breakers.record_success(SYNTHESIS_SERVICE, location);
    Ok(audio.freeze())
}
