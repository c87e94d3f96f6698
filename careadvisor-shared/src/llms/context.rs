//! # Context assembler
//!
//! Builds the bounded message sequence sent upstream: one system turn, at
//! most `window` trailing history turns in their original order, then the
//! new user turn. Pure and deterministic; callers own the inputs.

use crate::config::server::{LimitsConfig, LlmConfig};
use crate::llms::types::{ChatMessage, MessageRole};
use crate::models::chat::{ChatRole, ConversationTurn};

/// Fixed behavioral instructions for the health advisor.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are CareAdvisor, an AI health assistant for a healthcare portal. \
Answer general health questions clearly and compassionately, in plain \
language a patient can understand. Keep answers concise and well \
structured; use short paragraphs or brief lists. You are not a doctor: \
never diagnose, prescribe, or contradict a clinician's advice, and always \
remind users to consult a healthcare professional for personal medical \
concerns. For emergencies, tell the user to contact emergency services \
immediately. Politely decline questions outside of health and wellness.";

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    window: usize,
}

impl ContextBuilder {
    pub fn new(system_prompt: impl Into<String>, window: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            window,
        }
    }

    /// Builds the assembler from configuration, falling back to the built-in
    /// system prompt when no override is configured.
    #[must_use]
    pub fn from_config(limits: &LimitsConfig, llm: &LlmConfig) -> Self {
        let prompt = llm
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self::new(prompt, limits.context_messages)
    }

    /// Assemble the upstream message list for one request.
    ///
    /// Truncation only removes the oldest history entries beyond the window;
    /// the retained subset keeps its original chronological order.
    #[must_use]
    pub fn assemble(&self, history: &[ConversationTurn], message: &str) -> Vec<ChatMessage> {
        let skip = history.len().saturating_sub(self.window);

        let mut messages = Vec::with_capacity(history.len().min(self.window) + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));

        for turn in &history[skip..] {
            let role = match turn.role {
                ChatRole::User => MessageRole::User,
                ChatRole::Assistant => MessageRole::Assistant,
            };
            messages.push(ChatMessage {
                role,
                content: turn.content.clone(),
            });
        }

        messages.push(ChatMessage::user(message));
        messages
    }
}
