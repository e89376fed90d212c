//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Assistant display name (used in the system prompt and greeting)
    #[serde(default)]
    pub assistant_name: Option<String>,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Conversation configuration
    #[serde(default)]
    pub conversation: ConversationFileConfig,

    /// Local inference service endpoints
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// Extra trigger phrases merged into the command table at startup
    #[serde(default)]
    pub commands: CommandsFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "llama3.1:8b")
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Max tokens per reply (kept small for speech)
    pub max_tokens: Option<u32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Wake words (empty list = always listening)
    pub wake_words: Option<Vec<String>>,

    /// Seconds of trailing silence that ends an utterance
    pub silence_threshold_secs: Option<f32>,

    /// Hard cap on a single recording, in seconds
    pub max_recording_secs: Option<f32>,

    /// STT model size (e.g. "base", "small", "large-v3")
    pub stt_model: Option<String>,

    /// TTS engine selector (e.g. "bark", "piper")
    pub tts_engine: Option<String>,

    /// Initial TTS voice preset (must be one of the fixed preset list)
    pub tts_voice: Option<String>,
}

/// Conversation memory configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Max turns kept in history (oldest evicted first)
    pub history_cap: Option<usize>,
}

/// Base URLs for the local inference services
#[derive(Debug, Default, Deserialize)]
pub struct ServicesFileConfig {
    /// Speech-to-text server (OpenAI-compatible audio API)
    pub stt_url: Option<String>,

    /// Text-to-speech server
    pub tts_url: Option<String>,

    /// LLM server (Ollama-compatible chat API)
    pub llm_url: Option<String>,
}

/// User-supplied trigger phrases, merged into the built-in command table
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CommandsFileConfig {
    #[serde(default)]
    pub reset: Vec<String>,
    #[serde(default)]
    pub quit: Vec<String>,
    #[serde(default)]
    pub change_voice: Vec<String>,
    #[serde(default)]
    pub change_model: Vec<String>,
    #[serde(default)]
    pub summary: Vec<String>,
    #[serde(default)]
    pub help: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
}

/// Path to the config file (`~/.config/parley/config.toml`)
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("parley").join("config.toml"))
}

/// Load the TOML config file if present, returning defaults otherwise.
/// A malformed file is logged and ignored rather than aborting startup.
#[must_use]
pub fn load_config_file() -> ParleyConfigFile {
    let Some(path) = config_file_path() else {
        return ParleyConfigFile::default();
    };

    let Ok(contents) = std::fs::read_to_string(&path) else {
        return ParleyConfigFile::default();
    };

    match toml::from_str(&contents) {
        Ok(file) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            file
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
            ParleyConfigFile::default()
        }
    }
}
