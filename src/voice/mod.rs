//! Voice processing module
//!
//! Handles audio capture, utterance endpointing, playback, and the thin
//! STT/TTS adapters over the local inference servers.

mod capture;
mod endpoint;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, samples_to_wav};
pub use endpoint::{EndpointEvent, EndpointState, UtteranceEndpointer, rms_energy};
pub use playback::AudioPlayback;
pub use stt::{SpeechToText, WHISPER_MODELS};
pub use tts::{AudioFormat, SynthesizedAudio, TextToSpeech};
