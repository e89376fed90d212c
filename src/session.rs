//! Session state for one run of the assistant
//!
//! An explicit context object threaded through the interaction loop, holding
//! the active voice preset, the current and pending model selection, and the
//! conversation history. Model switches are staged here and applied only at
//! the top of the next loop iteration, never mid-turn.

use crate::config::{Config, VOICE_PRESETS};
use crate::history::ConversationHistory;

/// Mutable per-run state, touched only from the interaction loop
#[derive(Debug)]
pub struct Session {
    /// Index into [`VOICE_PRESETS`]
    voice_index: usize,

    /// Model currently used for LLM calls
    model: String,

    /// Model switch staged by a voice command, applied at the next
    /// iteration boundary
    pending_model: Option<String>,

    /// Bounded conversation memory
    pub history: ConversationHistory,

    /// Set by the quit command; checked at the top of each loop iteration
    stop_requested: bool,
}

impl Session {
    /// Create session state from the startup configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            voice_index: config.voice.tts_voice_index,
            model: config.llm.model.clone(),
            pending_model: None,
            history: ConversationHistory::new(config.history_cap),
            stop_requested: false,
        }
    }

    /// The active voice preset identifier
    #[must_use]
    pub fn voice_preset(&self) -> &'static str {
        // voice_index is always kept in range by the modular increment
        VOICE_PRESETS.get(self.voice_index).copied().unwrap_or(VOICE_PRESETS[0])
    }

    /// Advance to the next voice preset in the fixed cyclic list,
    /// returning the new preset
    pub fn next_voice_preset(&mut self) -> &'static str {
        self.voice_index = (self.voice_index + 1) % VOICE_PRESETS.len();
        self.voice_preset()
    }

    /// The model used for LLM calls this iteration
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stage a model switch for the next iteration boundary
    pub fn stage_model(&mut self, model: impl Into<String>) {
        self.pending_model = Some(model.into());
    }

    /// Apply a staged model switch, if any. Called at the top of each
    /// loop iteration, before any adapter call is issued.
    pub fn apply_pending_model(&mut self) {
        if let Some(model) = self.pending_model.take() {
            tracing::info!(from = %self.model, to = %model, "switching model");
            self.model = model;
        }
    }

    /// Request loop termination after the current turn completes
    pub const fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether a stop has been requested
    #[must_use]
    pub const fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, ServiceEndpoints, VoiceConfig};

    fn test_config() -> Config {
        Config {
            assistant_name: "Parley".to_string(),
            voice: VoiceConfig {
                wake_words: vec!["hey parley".to_string()],
                silence_threshold_secs: 0.8,
                max_recording_secs: 20.0,
                stt_model: "base".to_string(),
                tts_engine: "bark".to_string(),
                tts_voice_index: 3,
            },
            llm: LlmConfig {
                model: "llama3.1:8b".to_string(),
                temperature: 0.7,
                max_tokens: 150,
            },
            history_cap: 10,
            services: ServiceEndpoints {
                stt_url: "http://127.0.0.1:8178".to_string(),
                tts_url: "http://127.0.0.1:8179".to_string(),
                llm_url: "http://127.0.0.1:11434".to_string(),
            },
            extra_triggers: crate::config::file::CommandsFileConfig::default(),
        }
    }

    #[test]
    fn test_voice_preset_cycles_and_wraps() {
        let mut session = Session::new(&test_config());
        assert_eq!(session.voice_preset(), VOICE_PRESETS[3]);

        assert_eq!(session.next_voice_preset(), VOICE_PRESETS[4]);

        // Wrap 9 -> 0
        for _ in 0..5 {
            session.next_voice_preset();
        }
        assert_eq!(session.voice_preset(), VOICE_PRESETS[9]);
        assert_eq!(session.next_voice_preset(), VOICE_PRESETS[0]);
    }

    #[test]
    fn test_voice_change_leaves_history_untouched() {
        let mut session = Session::new(&test_config());
        session
            .history
            .append(crate::history::Turn::new(crate::history::Speaker::User, "hi"));

        session.next_voice_preset();
        assert_eq!(session.history.len(), 1);
    }

    #[test]
    fn test_model_switch_applies_at_boundary() {
        let mut session = Session::new(&test_config());
        assert_eq!(session.model(), "llama3.1:8b");

        session.stage_model("mistral:7b");
        // Not applied until the boundary
        assert_eq!(session.model(), "llama3.1:8b");

        session.apply_pending_model();
        assert_eq!(session.model(), "mistral:7b");

        // Idempotent when nothing is staged
        session.apply_pending_model();
        assert_eq!(session.model(), "mistral:7b");
    }

    #[test]
    fn test_stop_flag() {
        let mut session = Session::new(&test_config());
        assert!(!session.stop_requested());
        session.request_stop();
        assert!(session.stop_requested());
    }
}
