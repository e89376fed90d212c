//! Voice command dispatch
//!
//! Matches transcripts against a small table of trigger phrases before the
//! conversational fallback. The table is built once at startup and immutable
//! thereafter; custom phrases come in through configuration, not runtime
//! mutation. Matching is case-insensitive substring, checked in a fixed
//! priority order, first match wins.

use crate::config::file::CommandsFileConfig;

/// What a matched command asks the loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Terminate the loop after finishing playback
    Quit,
    /// Clear conversation history (voice and model selection untouched)
    Reset,
    /// Advance to the next voice preset
    ChangeVoice,
    /// Stage a model switch, or list alternatives if no model was named
    ChangeModel,
    /// Speak a history-derived summary without an LLM call
    Summary,
    /// Speak the command vocabulary
    Help,
    /// Speak loop health
    Status,
}

/// One entry in the trigger table
#[derive(Debug, Clone)]
pub struct VoiceCommand {
    /// Command name, for logging
    pub name: &'static str,
    /// Literal phrases whose presence selects this command
    pub triggers: Vec<String>,
    /// What the loop should do on a match
    pub action: CommandAction,
}

/// Outcome of dispatching a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A command matched
    Handled(CommandAction),
    /// No trigger matched; treat the transcript as conversation
    NotACommand,
}

/// The immutable-after-load command table
#[derive(Debug)]
pub struct CommandTable {
    commands: Vec<VoiceCommand>,
}

impl CommandTable {
    /// Build the table from built-in triggers plus configured extras.
    ///
    /// Order is priority order: system commands (quit, reset) are checked
    /// before everything else so that e.g. "quit" in a longer sentence
    /// never falls through to the model-change matcher.
    #[must_use]
    pub fn build(extra: &CommandsFileConfig) -> Self {
        let entry = |name, action, builtin: &[&str], extra: &[String]| VoiceCommand {
            name,
            triggers: builtin
                .iter()
                .map(|s| (*s).to_string())
                .chain(extra.iter().cloned())
                .map(|s| s.to_lowercase().trim().to_string())
                .collect(),
            action,
        };

        let commands = vec![
            entry(
                "quit",
                CommandAction::Quit,
                &["quit", "exit", "goodbye", "shut down", "bye"],
                &extra.quit,
            ),
            entry(
                "reset",
                CommandAction::Reset,
                &["reset", "new context", "clear memory", "start over", "forget everything"],
                &extra.reset,
            ),
            entry(
                "change_voice",
                CommandAction::ChangeVoice,
                &["change voice", "different voice", "new voice", "switch voice"],
                &extra.change_voice,
            ),
            entry(
                "change_model",
                CommandAction::ChangeModel,
                &["change model", "different model", "switch model", "change to"],
                &extra.change_model,
            ),
            entry(
                "summary",
                CommandAction::Summary,
                &["conversation summary", "what did we talk about", "recap"],
                &extra.summary,
            ),
            entry(
                "help",
                CommandAction::Help,
                &["help", "commands", "what can you do", "instructions"],
                &extra.help,
            ),
            entry(
                "status",
                CommandAction::Status,
                &["status", "are you working", "system status"],
                &extra.status,
            ),
        ];

        Self { commands }
    }

    /// Match a transcript against the table
    #[must_use]
    pub fn dispatch(&self, transcript: &str) -> Dispatch {
        let normalized = transcript.to_lowercase();

        for command in &self.commands {
            if command.triggers.iter().any(|t| normalized.contains(t.as_str())) {
                tracing::debug!(command = command.name, transcript, "voice command matched");
                return Dispatch::Handled(command.action);
            }
        }

        Dispatch::NotACommand
    }

    /// The registered commands, in priority order
    #[must_use]
    pub fn commands(&self) -> &[VoiceCommand] {
        &self.commands
    }
}

/// Extract the model named in a "change to <model>" transcript, if it is
/// one of `known`. Matching is case-insensitive.
#[must_use]
pub fn extract_model_name<'a>(transcript: &str, known: &'a [String]) -> Option<&'a str> {
    let normalized = transcript.to_lowercase();
    known
        .iter()
        .find(|m| normalized.contains(m.to_lowercase().as_str()))
        .map(String::as_str)
}
