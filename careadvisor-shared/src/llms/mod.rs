//! # LLM client layer
//!
//! Provider-agnostic types, the [`ChatModel`](traits::ChatModel) trait, the
//! context assembler, and the OpenAI-compatible streaming client.

pub mod context;
pub mod errors;
pub mod openai;
pub mod traits;
pub mod types;

pub use context::{ContextBuilder, DEFAULT_SYSTEM_PROMPT};
pub use errors::{LlmError, LlmResult};
pub use openai::OpenAiChatModel;
pub use traits::{ChatModel, TokenStream};
pub use types::{ChatMessage, CompletionRequest, MessageRole, TokenChunk};
