//! Voice activity detection over companded telephony frames
//!
//! Energy-based classification with hysteresis:
//!
//! * Speech starts only after `start_frames` consecutive speech-scored
//!   frames, so a single noise spike never opens an utterance.
//! * Speech ends only after `silence_timeout_ms` of continuous silence,
//!   so a mid-sentence pause never truncates the utterance.
//!
//! Start and end use different thresholds to avoid chatter around a
//! single cutoff. Classification is pure arithmetic on the decoded
//! frame and runs well inside the per-frame budget.

use domain::AudioFrame;
use serde::{Deserialize, Serialize};

use crate::converter;

/// Per-call voice activity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceActivityState {
    /// No speech; waiting for the caller
    Silence,
    /// Speech-scored frames arriving, hysteresis count not yet met
    SpeechStarting,
    /// Caller is speaking
    Speech,
    /// Silence timeout elapsed; utterance candidate has ended
    SpeechEnding,
}

/// Boundary events produced by state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// Silence → Speech transition completed
    SpeechStarted,
    /// Speech → SpeechEnding: the trailing silence timed out
    UtteranceCandidateEnded,
}

/// Result of classifying one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClassification {
    /// Whether the frame scored as speech
    pub is_speech: bool,
    /// Classifier confidence (0.0 to 1.0)
    pub confidence: f32,
    /// Boundary event triggered by this frame, if any
    pub event: Option<VadEvent>,
}

/// VAD configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// RMS energy above which a frame scores as speech
    #[serde(default = "default_speech_threshold")]
    pub speech_threshold: f32,

    /// RMS energy below which a frame scores as silence
    ///
    /// Kept below `speech_threshold`; frames between the two keep the
    /// current state.
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,

    /// Consecutive speech frames required to enter Speech
    #[serde(default = "default_start_frames")]
    pub start_frames: u32,

    /// Continuous silence required to end an utterance, in milliseconds
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
}

const fn default_start_frames() -> u32 {
    3
}

const fn default_silence_timeout_ms() -> u64 {
    800
}

fn default_speech_threshold() -> f32 {
    0.02
}

fn default_silence_threshold() -> f32 {
    0.01
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: default_speech_threshold(),
            silence_threshold: default_silence_threshold(),
            start_frames: default_start_frames(),
            silence_timeout_ms: default_silence_timeout_ms(),
        }
    }
}

/// Per-call voice activity detector
#[derive(Debug)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    state: VoiceActivityState,
    consecutive_speech_frames: u32,
    trailing_silence_ms: u64,
}

impl VoiceActivityDetector {
    /// Create a detector in the Silence state
    pub const fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VoiceActivityState::Silence,
            consecutive_speech_frames: 0,
            trailing_silence_ms: 0,
        }
    }

    /// Current state
    pub const fn state(&self) -> VoiceActivityState {
        self.state
    }

    /// Classify one frame and advance the state machine
    ///
    /// A malformed frame that fails to decode is classified as silence
    /// and logged; classification never fails past this boundary.
    pub fn classify(&mut self, frame: &AudioFrame) -> FrameClassification {
        let energy = match converter::decode_frame(frame) {
            Ok(samples) => converter::rms_energy(&samples),
            Err(e) => {
                tracing::warn!(
                    sequence = frame.sequence(),
                    error = %e,
                    "Malformed frame, classifying as silence"
                );
                0.0
            },
        };

        let is_speech = energy >= self.config.speech_threshold;
        let is_silence = energy < self.config.silence_threshold;
        let confidence = (energy / self.config.speech_threshold).min(1.0);

        let event = self.advance(is_speech, is_silence, frame.duration_ms());

        FrameClassification {
            is_speech,
            confidence,
            event,
        }
    }

    /// Reset to Silence, discarding hysteresis counters
    ///
    /// Called by the pipeline when a turn completes.
    pub fn reset(&mut self) {
        self.state = VoiceActivityState::Silence;
        self.consecutive_speech_frames = 0;
        self.trailing_silence_ms = 0;
    }

    fn advance(&mut self, is_speech: bool, is_silence: bool, frame_ms: u64) -> Option<VadEvent> {
        match self.state {
            VoiceActivityState::Silence => {
                if is_speech {
                    self.consecutive_speech_frames = 1;
                    if self.consecutive_speech_frames >= self.config.start_frames {
                        return self.enter_speech();
                    }
                    self.state = VoiceActivityState::SpeechStarting;
                }
                None
            },
            VoiceActivityState::SpeechStarting => {
                if is_speech {
                    self.consecutive_speech_frames += 1;
                    if self.consecutive_speech_frames >= self.config.start_frames {
                        return self.enter_speech();
                    }
                } else {
                    // Hysteresis not met; the spike was noise
                    self.consecutive_speech_frames = 0;
                    self.state = VoiceActivityState::Silence;
                }
                None
            },
            VoiceActivityState::Speech => {
                if is_silence {
                    self.trailing_silence_ms += frame_ms;
                    if self.trailing_silence_ms >= self.config.silence_timeout_ms {
                        tracing::debug!(
                            silence_ms = self.trailing_silence_ms,
                            "Utterance candidate ended"
                        );
                        self.state = VoiceActivityState::SpeechEnding;
                        return Some(VadEvent::UtteranceCandidateEnded);
                    }
                } else {
                    // A pause shorter than the timeout, or continued speech
                    self.trailing_silence_ms = 0;
                }
                None
            },
            VoiceActivityState::SpeechEnding => {
                if is_speech {
                    // The caller resumed; this starts a new utterance
                    self.consecutive_speech_frames = 1;
                    self.state = VoiceActivityState::SpeechStarting;
                } else {
                    self.state = VoiceActivityState::Silence;
                }
                None
            },
        }
    }

    fn enter_speech(&mut self) -> Option<VadEvent> {
        tracing::debug!(
            frames = self.consecutive_speech_frames,
            "Speech started"
        );
        self.state = VoiceActivityState::Speech;
        self.trailing_silence_ms = 0;
        Some(VadEvent::SpeechStarted)
    }
}
