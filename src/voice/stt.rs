//! Speech-to-text adapter
//!
//! Thin client for a locally running, OpenAI-compatible transcription
//! server (e.g. a whisper server). At most one transcription request is in
//! flight at any time; the interaction loop awaits each call.

use std::time::Duration;

use crate::{Error, Result};

/// Per-request timeout; local inference can be slow on CPU
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Whisper model sizes the server can be asked to use
pub const WHISPER_MODELS: [&str; 7] = [
    "tiny", "base", "small", "medium", "large-v1", "large-v2", "large-v3",
];

/// Response from the transcription endpoint
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes captured utterances against the local STT server
pub struct SpeechToText {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl SpeechToText {
    /// Create a new STT adapter
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Stt(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    /// Transcribe WAV audio bytes to text
    ///
    /// # Errors
    ///
    /// Returns `Error::Stt` on timeout, transport failure, or a non-success
    /// status (model not loaded)
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), model = %self.model, "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("server returned {status}: {body}")));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("invalid response: {e}")))?;

        let text = parsed.text.trim().to_string();
        tracing::debug!(transcript = %text, "transcription complete");
        Ok(text)
    }

    /// Probe the server for readiness (used by the `check` diagnostic)
    ///
    /// # Errors
    ///
    /// Returns `Error::Stt` if the server is unreachable
    pub async fn ready(&self) -> Result<()> {
        self.client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| Error::Stt(format!("server not reachable: {e}")))?;
        Ok(())
    }

    /// The configured model size
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}
