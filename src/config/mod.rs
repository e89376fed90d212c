//! Configuration management for Parley
//!
//! Resolution order is `env > toml > default`. Everything is read once at
//! startup; there is no hot-reload.

pub mod file;

use crate::{Error, Result};

/// Sample rate for capture and STT (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// The fixed cyclic list of voice presets (Bark speaker identifiers)
pub const VOICE_PRESETS: [&str; 10] = [
    "v2/en_speaker_0",
    "v2/en_speaker_1",
    "v2/en_speaker_2",
    "v2/en_speaker_3",
    "v2/en_speaker_4",
    "v2/en_speaker_5",
    "v2/en_speaker_6",
    "v2/en_speaker_7",
    "v2/en_speaker_8",
    "v2/en_speaker_9",
];

/// Parley configuration, fully resolved
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant display name
    pub assistant_name: String,

    /// Voice capture and synthesis configuration
    pub voice: VoiceConfig,

    /// LLM configuration
    pub llm: LlmConfig,

    /// Max turns kept in conversation history
    pub history_cap: usize,

    /// Local inference service endpoints
    pub services: ServiceEndpoints,

    /// Extra trigger phrases from the config file, keyed by command name
    pub extra_triggers: file::CommandsFileConfig,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Wake words checked against transcripts (empty = always listening)
    pub wake_words: Vec<String>,

    /// Seconds of trailing silence that ends an utterance
    pub silence_threshold_secs: f32,

    /// Hard cap on a single recording, in seconds
    pub max_recording_secs: f32,

    /// STT model size selector
    pub stt_model: String,

    /// TTS engine selector
    pub tts_engine: String,

    /// Index into [`VOICE_PRESETS`] for the startup voice
    pub tts_voice_index: usize,
}

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Max tokens per reply
    pub max_tokens: u32,
}

/// Base URLs for the three local inference services
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    /// Speech-to-text server
    pub stt_url: String,

    /// Text-to-speech server
    pub tts_url: String,

    /// LLM server
    pub llm_url: String,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured voice preset is not one of the fixed
    /// preset identifiers.
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();

        let assistant_name = std::env::var("PARLEY_NAME")
            .ok()
            .or(fc.assistant_name)
            .unwrap_or_else(|| "Parley".to_string());

        let wake_words = std::env::var("PARLEY_WAKE_WORD").map_or_else(
            |_| {
                fc.voice.wake_words.unwrap_or_else(|| {
                    vec![
                        format!("hey {}", assistant_name.to_lowercase()),
                        assistant_name.to_lowercase(),
                    ]
                })
            },
            |w| vec![w],
        );

        let tts_voice = std::env::var("PARLEY_TTS_VOICE")
            .ok()
            .or(fc.voice.tts_voice)
            .unwrap_or_else(|| VOICE_PRESETS[6].to_string());
        let tts_voice_index = VOICE_PRESETS
            .iter()
            .position(|p| *p == tts_voice)
            .ok_or_else(|| Error::Config(format!("unknown voice preset: {tts_voice}")))?;

        let voice = VoiceConfig {
            wake_words,
            silence_threshold_secs: env_parse("PARLEY_SILENCE_THRESHOLD")
                .or(fc.voice.silence_threshold_secs)
                .unwrap_or(0.8),
            max_recording_secs: env_parse("PARLEY_MAX_RECORDING")
                .or(fc.voice.max_recording_secs)
                .unwrap_or(20.0),
            stt_model: std::env::var("PARLEY_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "base".to_string()),
            tts_engine: std::env::var("PARLEY_TTS_ENGINE")
                .ok()
                .or(fc.voice.tts_engine)
                .unwrap_or_else(|| "bark".to_string()),
            tts_voice_index,
        };

        if voice.silence_threshold_secs <= 0.0 {
            return Err(Error::Config(
                "silence threshold must be positive".to_string(),
            ));
        }
        if voice.max_recording_secs <= voice.silence_threshold_secs {
            return Err(Error::Config(
                "max recording duration must exceed the silence threshold".to_string(),
            ));
        }

        let llm = LlmConfig {
            model: std::env::var("PARLEY_LLM_MODEL")
                .ok()
                .or(fc.llm.model)
                .unwrap_or_else(|| "llama3.1:8b".to_string()),
            temperature: env_parse("PARLEY_LLM_TEMPERATURE")
                .or(fc.llm.temperature)
                .unwrap_or(0.7),
            max_tokens: env_parse("PARLEY_LLM_MAX_TOKENS")
                .or(fc.llm.max_tokens)
                .unwrap_or(150),
        };

        let history_cap = env_parse("PARLEY_HISTORY_CAP")
            .or(fc.conversation.history_cap)
            .unwrap_or(10);
        if history_cap == 0 {
            return Err(Error::Config("history cap must be at least 1".to_string()));
        }

        let services = ServiceEndpoints {
            stt_url: std::env::var("PARLEY_STT_URL")
                .ok()
                .or(fc.services.stt_url)
                .unwrap_or_else(|| "http://127.0.0.1:8178".to_string()),
            tts_url: std::env::var("PARLEY_TTS_URL")
                .ok()
                .or(fc.services.tts_url)
                .unwrap_or_else(|| "http://127.0.0.1:8179".to_string()),
            llm_url: std::env::var("PARLEY_LLM_URL")
                .ok()
                .or(fc.services.llm_url)
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
        };

        Ok(Self {
            assistant_name,
            voice,
            llm,
            history_cap,
            services,
            extra_triggers: fc.commands,
        })
    }

    /// The system prompt sent ahead of every conversation
    #[must_use]
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}, a helpful voice assistant. You communicate through \
             speech, so keep responses concise and natural for speaking aloud \
             (one or two sentences), use conversational language, and avoid \
             lists, URLs, and markdown formatting.",
            self.assistant_name
        )
    }
}

/// Parse an env var into `T`, returning `None` if unset or unparsable
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_presets_are_fixed_and_distinct() {
        assert_eq!(VOICE_PRESETS.len(), 10);
        for (i, preset) in VOICE_PRESETS.iter().enumerate() {
            assert_eq!(*preset, format!("v2/en_speaker_{i}"));
        }
    }
}
