//! # Provider trait
//!
//! The seam between the request pipeline and whichever completion backend is
//! configured. The server depends only on [`ChatModel`]; tests substitute
//! scripted implementations.

use crate::llms::{
    errors::LlmResult,
    types::{CompletionRequest, TokenChunk},
};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// Type alias for the streamed model output.
pub type TokenStream = Pin<Box<dyn Stream<Item = LlmResult<TokenChunk>> + Send + 'static>>;

/// A streaming chat-completion backend.
///
/// `stream_chat` resolves only after the upstream has accepted the request,
/// so failures that occur before any content is produced surface as `Err`
/// rather than as a broken stream. Dropping the returned stream must release
/// the upstream call promptly.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Open a streaming completion for the given request.
    ///
    /// # Errors
    /// Returns an error if the upstream cannot be reached or rejects the
    /// request before emitting content. Individual stream items may also
    /// carry errors for mid-flight failures.
    async fn stream_chat(&self, request: CompletionRequest) -> LlmResult<TokenStream>;

    /// Identifier of the model served by this backend.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn stream_chat(&self, request: CompletionRequest) -> LlmResult<TokenStream> {
            let text = request
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default();
            let stream = async_stream::stream! {
                yield Ok(TokenChunk::delta(format!("Echo: {text}")));
                yield Ok(TokenChunk::final_marker());
            };
            Ok(Box::pin(stream))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn scripted_model_streams_in_order() {
        use crate::llms::types::ChatMessage;

        let model = EchoModel;
        let request = CompletionRequest::new("echo", vec![ChatMessage::user("hi")]);
        let mut stream = model.stream_chat(request).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta, "Echo: hi");
        assert!(!first.is_final);

        let second = stream.next().await.unwrap().unwrap();
        assert!(second.is_final);

        assert!(stream.next().await.is_none());
    }
}
