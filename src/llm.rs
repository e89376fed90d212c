//! Language model adapter
//!
//! Thin client for a locally running Ollama-compatible chat endpoint. The
//! prompt is assembled from the system preamble, the bounded conversation
//! history, and the new user turn; the model name comes in per call so a
//! staged model switch needs no client rebuild.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::history::ConversationHistory;
use crate::{Error, Result};

/// Per-request timeout for chat completions
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Replies longer than this are clamped before synthesis
const MAX_SPOKEN_CHARS: usize = 300;

/// One message in the chat payload
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// "system", "user", or "assistant"
    pub role: &'static str,
    /// Message text
    pub content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Generates conversational replies against the local LLM server
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// Create a new LLM adapter
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Generate a reply to `prompt` given the running conversation.
    /// History is not modified here; the loop appends turns only after a
    /// successful exchange.
    ///
    /// # Errors
    ///
    /// Returns `Error::Llm` on connection refused (server not running),
    /// timeout, or a malformed response
    pub async fn chat(
        &self,
        model: &str,
        system_prompt: &str,
        history: &ConversationHistory,
        prompt: &str,
    ) -> Result<String> {
        let messages = build_messages(system_prompt, history, prompt);

        tracing::debug!(model, messages = messages.len(), "requesting chat completion");

        let request = ChatRequest {
            model,
            messages: &messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("server returned {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("invalid response: {e}")))?;

        let reply = clean_for_voice(&parsed.message.content);
        tracing::debug!(chars = reply.len(), "chat completion received");
        Ok(reply)
    }

    /// Probe the server for readiness and list available models
    /// (used by the `check` diagnostic)
    ///
    /// # Errors
    ///
    /// Returns `Error::Llm` if the server is unreachable
    pub async fn ready(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelTag>,
        }

        #[derive(Deserialize)]
        struct ModelTag {
            name: String,
        }

        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| Error::Llm(format!("server not reachable: {e}")))?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("invalid response: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Assemble the chat payload: system preamble, then history in
/// chronological order, then the new user turn
fn build_messages(
    system_prompt: &str,
    history: &ConversationHistory,
    prompt: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);

    messages.push(ChatMessage {
        role: "system",
        content: system_prompt.to_string(),
    });

    for turn in history.as_prompt_context() {
        messages.push(ChatMessage {
            role: turn.speaker.role(),
            content: turn.text.clone(),
        });
    }

    messages.push(ChatMessage {
        role: "user",
        content: prompt.to_string(),
    });

    messages
}

/// Clean up a model reply for speech output: strip markdown markers and
/// URLs, clamp the length, and close with punctuation
fn clean_for_voice(response: &str) -> String {
    let mut text: String = response
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '#'))
        .collect();

    // Replace URLs with a spoken placeholder
    while let Some(start) = text.find("http://").or_else(|| text.find("https://")) {
        let end = text[start..]
            .find(char::is_whitespace)
            .map_or(text.len(), |i| start + i);
        text.replace_range(start..end, "a website");
    }

    let mut text = text.trim().to_string();

    if text.chars().count() > MAX_SPOKEN_CHARS {
        text = text.chars().take(MAX_SPOKEN_CHARS).collect();
        // Cut at the last word boundary so the clamp is not mid-word
        if let Some(pos) = text.rfind(' ') {
            text.truncate(pos);
        }
        text.push('…');
    }

    if !text.is_empty() && !text.ends_with(['.', '!', '?', '…']) {
        text.push('.');
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Speaker, Turn};

    #[test]
    fn test_build_messages_order() {
        let mut history = ConversationHistory::new(5);
        history.append(Turn::new(Speaker::User, "hello"));
        history.append(Turn::new(Speaker::Assistant, "hi"));

        let messages = build_messages("be brief", &history, "how are you");

        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[0].content, "be brief");
        assert_eq!(messages[3].content, "how are you");
    }

    #[test]
    fn test_clean_strips_markdown() {
        assert_eq!(clean_for_voice("**bold** and `code`"), "bold and code.");
    }

    #[test]
    fn test_clean_replaces_urls() {
        assert_eq!(
            clean_for_voice("see https://example.com/docs for details"),
            "see a website for details."
        );
    }

    #[test]
    fn test_clean_keeps_punctuation() {
        assert_eq!(clean_for_voice("All good!"), "All good!");
    }

    #[test]
    fn test_clean_clamps_long_replies() {
        let long = "word ".repeat(200);
        let cleaned = clean_for_voice(&long);
        assert!(cleaned.chars().count() <= MAX_SPOKEN_CHARS + 1);
        assert!(cleaned.ends_with('…'));
    }
}
