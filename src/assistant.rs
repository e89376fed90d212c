//! The interaction loop
//!
//! Owns the turn cycle: capture an utterance, transcribe it, intercept
//! voice commands, otherwise converse through the LLM, then synthesize and
//! play the reply. One phase at a time; no adapter call overlaps another.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::commands::{CommandAction, CommandTable, Dispatch, extract_model_name};
use crate::config::{Config, SAMPLE_RATE};
use crate::history::{ConversationHistory, Speaker, Turn};
use crate::llm::LlmClient;
use crate::session::Session;
use crate::voice::{
    AudioCapture, AudioFormat, AudioPlayback, EndpointEvent, SpeechToText, TextToSpeech,
    UtteranceEndpointer, samples_to_wav,
};
use crate::{Error, Result};

/// How often the loop drains the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded retry budget for LLM unavailability within one turn
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Delay between retries
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Phases of the turn cycle, in the order they occur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting to start a turn
    Idle,
    /// Buffering microphone audio
    Listening,
    /// Utterance sent to the STT server
    Transcribing,
    /// Matching the transcript against the command table
    Dispatching,
    /// Conversational turn in flight to the LLM
    Responding,
    /// Reply text sent to the TTS server
    Synthesizing,
    /// Synthesized audio playing
    Playing,
    /// Terminal: quit command or fatal error
    Stopped,
}

/// The assistant: adapters plus session state, driven by [`Assistant::run`]
pub struct Assistant {
    config: Config,
    commands: CommandTable,
    capture: AudioCapture,
    playback: AudioPlayback,
    stt: SpeechToText,
    tts: TextToSpeech,
    llm: LlmClient,
    session: Session,
    phase: Phase,
}

impl Assistant {
    /// Create the assistant, opening audio devices and building adapters
    ///
    /// # Errors
    ///
    /// Returns error if an audio device cannot be opened (fatal) or an
    /// adapter cannot be constructed
    pub fn new(config: Config) -> Result<Self> {
        let capture = AudioCapture::new()?;
        let playback = AudioPlayback::new()?;
        let stt = SpeechToText::new(&config.services.stt_url, &config.voice.stt_model)?;
        let tts = TextToSpeech::new(&config.services.tts_url, &config.voice.tts_engine)?;
        let llm = LlmClient::new(&config.services.llm_url, &config.llm)?;
        let session = Session::new(&config);
        let commands = CommandTable::build(&config.extra_triggers);

        Ok(Self {
            config,
            commands,
            capture,
            playback,
            stt,
            tts,
            llm,
            session,
            phase: Phase::Idle,
        })
    }

    /// Current phase (visible for diagnostics)
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        tracing::trace!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }

    /// Run the loop until a quit command, ctrl-c, or fatal error
    ///
    /// # Errors
    ///
    /// Returns error only for unrecoverable failures; adapter errors are
    /// converted into loop-level recovery (retry, skip turn, or degrade)
    pub async fn run(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        self.capture.start()?;

        let wake_words = self.config.voice.wake_words.clone();
        if wake_words.is_empty() {
            tracing::info!("listening (no wake word configured)");
        } else {
            tracing::info!(wake_words = ?wake_words, "listening for wake word");
        }

        self.speak(&format!(
            "Hello! I'm {}. How can I help you?",
            self.config.assistant_name
        ))
        .await;

        loop {
            if self.session.stop_requested() {
                break;
            }

            // Staged model switches take effect here, never mid-turn
            self.session.apply_pending_model();

            self.transition(Phase::Listening);
            let samples = match self.listen(shutdown_rx).await {
                Ok(samples) => samples,
                Err(Error::NoSpeechDetected) => {
                    tracing::debug!("no speech in window, re-listening");
                    continue;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "capture failed, re-listening");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if self.session.stop_requested() {
                break;
            }

            self.transition(Phase::Transcribing);
            let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
            let transcript = match self.stt.transcribe(wav).await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "transcription failed, re-listening");
                    continue;
                }
            };
            tracing::info!(transcript = %transcript, "heard");

            let request = if wake_words.is_empty() {
                transcript
            } else {
                match self.gate_on_wake_word(&transcript, &wake_words, shutdown_rx).await {
                    Some(request) => request,
                    None => continue,
                }
            };

            self.handle_request(&request).await;
        }

        self.capture.stop();
        self.transition(Phase::Stopped);
        tracing::info!("assistant stopped");
        Ok(())
    }

    /// Check the transcript for a wake word; returns the request to handle
    /// or `None` to keep listening.
    ///
    /// A bare wake word gets a spoken acknowledgment, then one more capture
    /// for the actual request.
    async fn gate_on_wake_word(
        &mut self,
        transcript: &str,
        wake_words: &[String],
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Option<String> {
        let normalized = transcript.to_lowercase();
        let wake_word = wake_words
            .iter()
            .find(|w| normalized.contains(w.to_lowercase().as_str()))?;

        tracing::debug!(wake_word = %wake_word, "wake word detected");

        let trailing = extract_request(transcript, wake_word);
        if !trailing.is_empty() {
            return Some(trailing);
        }

        // Bare wake word: acknowledge, then capture the actual request
        self.speak("Yes?").await;

        self.transition(Phase::Listening);
        let samples = match self.listen(shutdown_rx).await {
            Ok(samples) => samples,
            Err(Error::NoSpeechDetected) => {
                self.speak("I didn't catch that. Could you repeat?").await;
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "follow-up capture failed");
                return None;
            }
        };

        self.transition(Phase::Transcribing);
        let wav = samples_to_wav(&samples, SAMPLE_RATE).ok()?;
        match self.stt.transcribe(wav).await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => {
                self.speak("I didn't catch that. Could you repeat?").await;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                self.speak("Sorry, I didn't catch that.").await;
                None
            }
        }
    }

    /// Capture one utterance, returning its samples.
    ///
    /// Sub-minimum utterances restart capture in place, without an STT
    /// round trip. A ctrl-c while listening requests a stop and returns
    /// `NoSpeechDetected` so the caller falls out of the loop.
    async fn listen(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<Vec<f32>> {
        let mut endpointer = UtteranceEndpointer::new(&self.config.voice);
        self.capture.clear_buffer();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    self.session.request_stop();
                    return Err(Error::NoSpeechDetected);
                }
                () = tokio::time::sleep(POLL_INTERVAL) => {
                    let chunk = self.capture.take_buffer();
                    if chunk.is_empty() {
                        continue;
                    }

                    match endpointer.feed(&chunk) {
                        Some(EndpointEvent::Utterance(samples)) => return Ok(samples),
                        Some(EndpointEvent::NoSpeech) => return Err(Error::NoSpeechDetected),
                        Some(EndpointEvent::TooShort) => {
                            tracing::debug!("discarded short utterance, still listening");
                        }
                        None => {}
                    }
                }
            }
        }
    }

    /// Dispatch the request as a command or converse through the LLM
    async fn handle_request(&mut self, request: &str) {
        self.transition(Phase::Dispatching);

        match self.commands.dispatch(request) {
            Dispatch::Handled(action) => self.run_command(action, request).await,
            Dispatch::NotACommand => self.converse(request).await,
        }
    }

    /// Apply a command's side effects and speak its response
    async fn run_command(&mut self, action: CommandAction, request: &str) {
        tracing::info!(?action, "handling voice command");

        match action {
            CommandAction::Quit => {
                // Farewell playback completes before the stop flag is
                // honored at the top of the loop
                self.speak("Goodbye! It was nice talking with you.").await;
                self.session.request_stop();
            }
            CommandAction::Reset => {
                self.session.history.reset();
                self.speak("Conversation context has been reset. How can I help you?")
                    .await;
            }
            CommandAction::ChangeVoice => {
                let preset = self.session.next_voice_preset();
                tracing::info!(preset, "voice preset changed");
                let speaker = preset.rsplit('_').next().unwrap_or(preset);
                self.speak(&format!("Voice changed to speaker {speaker}."))
                    .await;
            }
            CommandAction::ChangeModel => {
                match self.llm.ready().await {
                    Ok(models) => {
                        if let Some(model) = extract_model_name(request, &models) {
                            self.session.stage_model(model);
                            self.speak(&format!(
                                "Okay, I'll use {model} from the next question on."
                            ))
                            .await;
                        } else {
                            let listing = models
                                .iter()
                                .take(5)
                                .map(String::as_str)
                                .collect::<Vec<_>>()
                                .join(", ");
                            self.speak(&format!(
                                "Available models are: {listing}. Say 'change to' \
                                 followed by a model name to switch."
                            ))
                            .await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "model listing failed");
                        self.speak("I can't reach the language model server right now.")
                            .await;
                    }
                }
            }
            CommandAction::Summary => {
                let summary = self.session.history.summary();
                self.speak(&summary).await;
            }
            CommandAction::Help => {
                self.speak(
                    "You can say 'reset' to clear our conversation, 'change voice' \
                     for a different voice, 'change model' to switch models, \
                     'conversation summary' to hear what we discussed, 'quit' to \
                     stop, or just ask me anything.",
                )
                .await;
            }
            CommandAction::Status => {
                let response = format!(
                    "All systems running. I'm using the {} model, voice preset {}, \
                     and I remember {} turns of our conversation.",
                    self.session.model(),
                    self.session.voice_preset(),
                    self.session.history.len()
                );
                self.speak(&response).await;
            }
        }
    }

    /// A conversational turn: LLM with bounded retries, then history
    /// append, then speech. History is untouched when every attempt fails.
    async fn converse(&mut self, request: &str) {
        self.transition(Phase::Responding);

        let system_prompt = self.config.system_prompt();
        let model = self.session.model().to_string();

        let Some(reply) = complete_exchange(
            &self.llm,
            &model,
            &system_prompt,
            &mut self.session.history,
            request,
        )
        .await
        else {
            tracing::error!("language model unavailable, skipping turn");
            self.speak("I'm having trouble thinking right now. Please try again in a moment.")
                .await;
            return;
        };

        tracing::info!(reply = %reply, "assistant reply");
        self.speak(&reply).await;
    }

    /// Synthesize and play text with the session's voice preset.
    ///
    /// Synthesis failure degrades to printed text rather than aborting the
    /// turn; playback failure is logged and the turn continues.
    async fn speak(&mut self, text: &str) {
        self.transition(Phase::Synthesizing);

        let audio = match self.tts.synthesize(text, self.session.voice_preset()).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, printing instead");
                println!("{}: {text}", self.config.assistant_name);
                return;
            }
        };

        self.transition(Phase::Playing);
        let result = match audio.format {
            AudioFormat::Wav => self.playback.play_wav(&audio.data).await,
            AudioFormat::Mp3 => self.playback.play_mp3(&audio.data).await,
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "playback failed");
            println!("{}: {text}", self.config.assistant_name);
        }
    }
}

/// Run one LLM exchange with bounded retries.
///
/// Both turns are recorded only after a successful call, in strict
/// chronological order; a turn whose every attempt fails leaves history
/// untouched.
async fn complete_exchange(
    llm: &LlmClient,
    model: &str,
    system_prompt: &str,
    history: &mut ConversationHistory,
    request: &str,
) -> Option<String> {
    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        match llm.chat(model, system_prompt, history, request).await {
            Ok(reply) => {
                history.append(Turn::new(Speaker::User, request));
                history.append(Turn::new(Speaker::Assistant, reply.clone()));
                return Some(reply);
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "LLM call failed");
                if attempt < MAX_RETRY_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
    None
}

/// Extract the request trailing a wake word ("hey parley, what time is it"
/// becomes "what time is it"), preserving the original casing
fn extract_request(transcript: &str, wake_word: &str) -> String {
    let needle: Vec<char> = wake_word.chars().map(lowered).collect();
    if needle.is_empty() {
        return String::new();
    }

    // Char-wise match over original byte offsets, so the remainder can be
    // sliced out of the transcript as spoken
    let haystack: Vec<(usize, char)> = transcript
        .char_indices()
        .map(|(i, c)| (i, lowered(c)))
        .collect();

    haystack
        .windows(needle.len())
        .position(|window| window.iter().map(|&(_, c)| c).eq(needle.iter().copied()))
        .map_or_else(String::new, |pos| {
            let after = pos + needle.len();
            let byte = haystack.get(after).map_or(transcript.len(), |&(i, _)| i);
            transcript[byte..]
                .trim_start_matches([',', '.', '!', '?', ' '])
                .trim()
                .to_string()
        })
}

fn lowered(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[test]
    fn test_extract_request_trailing() {
        assert_eq!(
            extract_request("Hey Parley, what time is it?", "hey parley"),
            "what time is it?"
        );
    }

    #[test]
    fn test_extract_request_preserves_casing_past_multibyte_lowercase() {
        // 'İ' lowercases to two chars and a different byte length; the
        // remainder must still come back as spoken, not lowercased
        assert_eq!(
            extract_request("Hey Parley, is İstanbul nice?", "hey parley"),
            "is İstanbul nice?"
        );
    }

    #[test]
    fn test_extract_request_bare_wake_word() {
        assert_eq!(extract_request("Hey Parley", "hey parley"), "");
        assert_eq!(extract_request("hey parley.", "hey parley"), "");
    }

    #[test]
    fn test_extract_request_no_wake_word() {
        assert_eq!(extract_request("what time is it", "hey parley"), "");
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_history_unchanged() {
        // Bind then drop to get a local port nothing is listening on
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let llm = LlmClient::new(
            &format!("http://{addr}"),
            &LlmConfig {
                model: "llama3.1:8b".to_string(),
                temperature: 0.7,
                max_tokens: 150,
            },
        )
        .unwrap();

        let mut history = ConversationHistory::new(10);
        history.append(Turn::new(Speaker::User, "earlier question"));
        history.append(Turn::new(Speaker::Assistant, "earlier answer"));

        let reply = complete_exchange(
            &llm,
            "llama3.1:8b",
            "You are a test assistant.",
            &mut history,
            "hello",
        )
        .await;

        // Every retry fails; no partial turn may land in history
        assert_eq!(reply, None);
        assert_eq!(history.len(), 2);
        let texts: Vec<&str> = history.as_prompt_context().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["earlier question", "earlier answer"]);
    }
}
