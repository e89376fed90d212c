//! Bounded conversation memory
//!
//! An ordered FIFO of turns used to build the LLM prompt. The cap is
//! enforced on append; truncation always evicts the oldest turn first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The human talking to the assistant
    User,
    /// The assistant's reply
    Assistant,
}

impl Speaker {
    /// Chat API role string for this speaker
    #[must_use]
    pub const fn role(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One exchange unit recorded in history. Immutable once created.
#[derive(Debug, Clone)]
pub struct Turn {
    /// Who spoke
    pub speaker: Speaker,
    /// What was said
    pub text: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, bounded conversation history
#[derive(Debug)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    cap: usize,
}

impl ConversationHistory {
    /// Create an empty history holding at most `cap` turns
    ///
    /// # Panics
    ///
    /// Panics if `cap` is zero (rejected by config validation before this).
    #[must_use]
    pub fn new(cap: usize) -> Self {
        assert!(cap > 0, "history cap must be at least 1");
        Self {
            turns: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a turn, evicting the oldest if the cap is reached
    pub fn append(&mut self, turn: Turn) {
        if self.turns.len() == self.cap {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Turns in chronological order, for prompt assembly
    #[must_use]
    pub fn as_prompt_context(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Clear all turns
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Number of turns currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Configured cap
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// A short spoken summary derived from the most recent user turns,
    /// without an LLM round trip
    #[must_use]
    pub fn summary(&self) -> String {
        let user_texts: Vec<&str> = self
            .turns
            .iter()
            .filter(|t| t.speaker == Speaker::User)
            .map(|t| t.text.as_str())
            .collect();

        if user_texts.is_empty() {
            return "We haven't talked about anything yet.".to_string();
        }

        let recent = user_texts
            .iter()
            .rev()
            .take(3)
            .rev()
            .copied()
            .collect::<Vec<_>>()
            .join(", ");

        if user_texts.len() <= 3 {
            format!("Recent topics: {recent}.")
        } else {
            format!(
                "Recent topics: {recent}, and {} more.",
                user_texts.len() - 3
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_within_cap() {
        let mut history = ConversationHistory::new(4);
        history.append(Turn::new(Speaker::User, "hello"));
        history.append(Turn::new(Speaker::Assistant, "hi there"));

        assert_eq!(history.len(), 2);
        let texts: Vec<&str> = history.as_prompt_context().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["hello", "hi there"]);
    }

    #[test]
    fn test_fifo_eviction_keeps_most_recent_in_order() {
        let mut history = ConversationHistory::new(3);
        for i in 0..10 {
            history.append(Turn::new(Speaker::User, format!("turn {i}")));
            assert!(history.len() <= 3);
        }

        let texts: Vec<&str> = history.as_prompt_context().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["turn 7", "turn 8", "turn 9"]);
    }

    #[test]
    fn test_reset_empties_history() {
        let mut history = ConversationHistory::new(5);
        for i in 0..5 {
            history.append(Turn::new(Speaker::User, format!("turn {i}")));
        }

        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.as_prompt_context().count(), 0);

        // Still usable after reset
        history.append(Turn::new(Speaker::User, "fresh start"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_summary_empty() {
        let history = ConversationHistory::new(5);
        assert_eq!(history.summary(), "We haven't talked about anything yet.");
    }

    #[test]
    fn test_summary_counts_only_user_turns() {
        let mut history = ConversationHistory::new(10);
        history.append(Turn::new(Speaker::User, "the weather"));
        history.append(Turn::new(Speaker::Assistant, "it's sunny"));
        history.append(Turn::new(Speaker::User, "music"));

        assert_eq!(history.summary(), "Recent topics: the weather, music.");
    }

    #[test]
    fn test_summary_truncates_to_three_topics() {
        let mut history = ConversationHistory::new(10);
        for topic in ["a", "b", "c", "d", "e"] {
            history.append(Turn::new(Speaker::User, topic));
        }

        assert_eq!(history.summary(), "Recent topics: c, d, e, and 2 more.");
    }
}
