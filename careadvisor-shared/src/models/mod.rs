pub mod chat;

pub use chat::{ChatErrorBody, ChatRequest, ChatRole, ConversationTurn};
