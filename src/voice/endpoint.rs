//! Utterance endpointing
//!
//! Energy-based voice activity detection over the capture stream. Buffers
//! samples while speech persists and cuts the utterance when trailing
//! silence exceeds the configured threshold or the recording hits its hard
//! duration cap. A bounded no-speech window keeps the loop from blocking
//! forever when nobody talks.

use crate::config::{SAMPLE_RATE, VoiceConfig};

/// Minimum audio energy (RMS) to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum viable utterance length (0.3s at 16kHz); anything shorter is a
/// cough or a click and is discarded without an STT round trip
const MIN_UTTERANCE_SAMPLES: usize = 4800;

/// How long to wait for any speech before reporting no-speech (seconds)
const NO_SPEECH_WAIT_SECS: f32 = 10.0;

/// State of the endpointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech energy
    Idle,
    /// Speech detected, buffering the utterance
    Recording,
}

/// Events produced while feeding audio through the endpointer
#[derive(Debug, PartialEq)]
pub enum EndpointEvent {
    /// A finished utterance, bounded by detected silence or the duration cap
    Utterance(Vec<f32>),
    /// Nothing above the energy threshold within the bounded wait window
    NoSpeech,
    /// Speech ended but was too short to be worth transcribing
    TooShort,
}

/// Detects utterance boundaries in a sample stream
pub struct UtteranceEndpointer {
    state: EndpointState,
    buffer: Vec<f32>,
    silence_samples: usize,
    idle_samples: usize,
    /// Trailing silence that ends an utterance, in samples
    silence_limit: usize,
    /// Hard cap on utterance length, in samples
    max_samples: usize,
    /// Bounded wait for first speech, in samples
    no_speech_limit: usize,
}

impl UtteranceEndpointer {
    /// Create an endpointer from the voice configuration
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        Self::with_thresholds(config.silence_threshold_secs, config.max_recording_secs)
    }

    /// Create an endpointer with explicit thresholds in seconds
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn with_thresholds(silence_threshold_secs: f32, max_recording_secs: f32) -> Self {
        Self {
            state: EndpointState::Idle,
            buffer: Vec::new(),
            silence_samples: 0,
            idle_samples: 0,
            silence_limit: (silence_threshold_secs * SAMPLE_RATE as f32) as usize,
            max_samples: (max_recording_secs * SAMPLE_RATE as f32) as usize,
            no_speech_limit: (NO_SPEECH_WAIT_SECS * SAMPLE_RATE as f32) as usize,
        }
    }

    /// Feed a chunk of captured samples; returns an event when the
    /// endpointer reaches a boundary, `None` while still accumulating
    pub fn feed(&mut self, samples: &[f32]) -> Option<EndpointEvent> {
        let is_speech = rms_energy(samples) > ENERGY_THRESHOLD;

        match self.state {
            EndpointState::Idle => {
                if is_speech {
                    self.state = EndpointState::Recording;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence_samples = 0;
                    tracing::trace!("speech detected, recording");
                    None
                } else {
                    self.idle_samples += samples.len();
                    if self.idle_samples >= self.no_speech_limit {
                        self.reset();
                        Some(EndpointEvent::NoSpeech)
                    } else {
                        None
                    }
                }
            }
            EndpointState::Recording => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                tracing::trace!(
                    buffered = self.buffer.len(),
                    silence = self.silence_samples,
                    is_speech,
                    "recording"
                );

                if self.silence_samples >= self.silence_limit || self.buffer.len() >= self.max_samples {
                    let trailing_silence = self.silence_samples;
                    let utterance = std::mem::take(&mut self.buffer);
                    self.reset();

                    // Length excluding trailing silence is what matters for
                    // the minimum-viable check
                    let speech_len = utterance.len().saturating_sub(trailing_silence);
                    if speech_len < MIN_UTTERANCE_SAMPLES {
                        tracing::debug!(samples = utterance.len(), "utterance too short, discarding");
                        Some(EndpointEvent::TooShort)
                    } else {
                        tracing::debug!(samples = utterance.len(), "utterance complete");
                        Some(EndpointEvent::Utterance(utterance))
                    }
                } else {
                    None
                }
            }
        }
    }

    /// Reset to idle, clearing the buffer and counters
    pub fn reset(&mut self) {
        self.state = EndpointState::Idle;
        self.buffer.clear();
        self.silence_samples = 0;
        self.idle_samples = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }
}

/// RMS energy of a sample buffer
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(rms_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms_energy(&loud) > 0.4);
    }

    #[test]
    fn test_idle_until_speech() {
        let mut ep = UtteranceEndpointer::with_thresholds(0.5, 20.0);

        assert_eq!(ep.feed(&[0.0; 1600]), None);
        assert_eq!(ep.state(), EndpointState::Idle);

        assert_eq!(ep.feed(&[0.3; 1600]), None);
        assert_eq!(ep.state(), EndpointState::Recording);
    }

    #[test]
    fn test_no_speech_window() {
        let mut ep = UtteranceEndpointer::with_thresholds(0.5, 20.0);

        // Feed 10 seconds of silence in 100ms chunks
        let chunk = vec![0.0f32; 1600];
        let mut event = None;
        for _ in 0..100 {
            if let Some(e) = ep.feed(&chunk) {
                event = Some(e);
                break;
            }
        }
        assert_eq!(event, Some(EndpointEvent::NoSpeech));
        assert_eq!(ep.state(), EndpointState::Idle);
    }
}
