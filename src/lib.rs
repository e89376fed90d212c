//! Parley - an offline voice assistant loop
//!
//! This library glues together three locally running inference services:
//! - Speech-to-text (whisper-style transcription server)
//! - A language model (Ollama-compatible chat server)
//! - Text-to-speech (Bark-style synthesis server)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                Interaction Loop                   │
//! │  Listen │ Transcribe │ Dispatch │ Respond │ Play │
//! └────────────────────┬─────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────┐
//! │              Local inference servers              │
//! │      STT      │       LLM       │      TTS       │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! The loop is single-threaded by design: one phase at a time, at most one
//! in-flight request per adapter, no locks around session state.

pub mod assistant;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod session;
pub mod voice;

pub use assistant::{Assistant, Phase};
pub use commands::{CommandAction, CommandTable, Dispatch};
pub use config::Config;
pub use error::{Error, Result};
pub use history::{ConversationHistory, Speaker, Turn};
pub use llm::LlmClient;
pub use session::Session;
