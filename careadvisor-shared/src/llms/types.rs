//! Data types exchanged with the upstream completion provider.

use serde::{Deserialize, Serialize};

/// Role of a message in the assembled upstream context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single role-tagged message sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A streaming completion request in the OpenAI-compatible shape.
///
/// Constructed fresh per request from the assembled context; never shared or
/// mutated after construction.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: 500,
            stream: true,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// One forwardable unit of streamed model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChunk {
    /// Text produced since the previous chunk; may be empty on the final
    /// marker.
    pub delta: String,

    /// Set when the provider signalled completion for this stream.
    pub is_final: bool,
}

impl TokenChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            is_final: false,
        }
    }

    #[must_use]
    pub fn final_marker() -> Self {
        Self {
            delta: String::new(),
            is_final: true,
        }
    }
}
