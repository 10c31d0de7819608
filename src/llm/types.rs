//! Common types for the completion API

use serde::{Deserialize, Serialize};

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Configuration for a completion provider
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: Option<u32>,
}

/// Parameters for a single chat completion call
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Number of alternative completions to request
    pub outputs: u32,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            outputs: 1,
            temperature: 0.75,
            max_tokens: None,
        }
    }
}

/// Result of one completion round
#[derive(Debug, Clone, Default)]
pub struct CompletionOutcome {
    /// Completion texts, one per requested output, in API order
    pub texts: Vec<String>,
    /// Suggested next queries, when requested and available
    pub follow_up: Option<String>,
}

impl CompletionOutcome {
    /// First completion text, the one surfaced to the caller
    pub fn primary(&self) -> &str {
        self.texts.first().map(String::as_str).unwrap_or_default()
    }
}
