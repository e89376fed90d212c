//! Text-to-speech adapter
//!
//! Thin client for a locally running synthesis server. The voice preset is
//! passed per request so a mid-session "change voice" needs no client
//! rebuild.

use std::time::Duration;

use crate::{Error, Result};

/// Per-request timeout; large TTS models are slow to synthesize
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Audio container produced by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// 16-bit PCM WAV (the local server default)
    Wav,
    /// MP3
    Mp3,
}

impl AudioFormat {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

/// Request body for the synthesis endpoint
#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    /// Engine selector ("bark", "piper", ...)
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Synthesized audio plus its container format
pub struct SynthesizedAudio {
    /// Encoded audio bytes
    pub data: Vec<u8>,
    /// Container the bytes are in
    pub format: AudioFormat,
}

/// Synthesizes speech against the local TTS server
pub struct TextToSpeech {
    client: reqwest::Client,
    base_url: String,
    engine: String,
    format: AudioFormat,
}

impl TextToSpeech {
    /// Create a new TTS adapter
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, engine: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Tts(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            engine: engine.into(),
            format: AudioFormat::Wav,
        })
    }

    /// Synthesize text with the given voice preset
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` on transport failure, an unsupported preset, or
    /// a server-side synthesis failure (e.g. out of memory on large models)
    pub async fn synthesize(&self, text: &str, voice_preset: &str) -> Result<SynthesizedAudio> {
        tracing::debug!(
            chars = text.len(),
            voice = voice_preset,
            engine = %self.engine,
            "starting synthesis"
        );

        let request = SpeechRequest {
            model: &self.engine,
            input: text,
            voice: voice_preset,
            response_format: self.format.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("server returned {status}: {body}")));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("failed to read audio: {e}")))?
            .to_vec();

        if data.is_empty() {
            return Err(Error::Tts("server returned empty audio".to_string()));
        }

        tracing::debug!(bytes = data.len(), "synthesis complete");
        Ok(SynthesizedAudio {
            data,
            format: self.format,
        })
    }

    /// Probe the server for readiness (used by the `check` diagnostic)
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` if the server is unreachable
    pub async fn ready(&self) -> Result<()> {
        self.client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| Error::Tts(format!("server not reachable: {e}")))?;
        Ok(())
    }

    /// The configured engine selector
    #[must_use]
    pub fn engine(&self) -> &str {
        &self.engine
    }
}
