//! OpenAI-compatible streaming completion client.
//!
//! Speaks the chat-completions streaming protocol: each chunk arrives as a
//! `data: {json}` SSE line, the stream ends with `data: [DONE]`. Lines may
//! be split across network reads, so a carry-over buffer reassembles them
//! before parsing.

use crate::config::server::LlmConfig;
use crate::llms::{
    errors::{LlmError, LlmResult},
    traits::{ChatModel, TokenStream},
    types::{CompletionRequest, TokenChunk},
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Client for any provider exposing the OpenAI chat-completions API.
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiChatModel {
    /// Build the client from configuration.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|err| LlmError::connect(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn stream_chat(&self, mut request: CompletionRequest) -> LlmResult<TokenStream> {
        request.stream = true;
        let url = format!("{}/chat/completions", self.base_url);

        let mut call = self.client.post(&url).json(&request);
        if let Some(key) = self.api_key.as_deref() {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|err| LlmError::connect(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::upstream(status.as_u16(), message));
        }

        debug!(model = %request.model, "upstream stream opened");
        Ok(sse_token_stream(response.bytes_stream()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// One parsed server-sent event from the completion stream.
#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Chunk(TokenChunk),
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse a single SSE line into an event.
///
/// Returns `Ok(None)` for blank lines, comments, and chunks carrying no
/// forwardable content (such as the initial role announcement).
fn parse_sse_line(line: &str) -> LlmResult<Option<SseEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let payload: ChunkPayload = serde_json::from_str(data)
        .map_err(|err| LlmError::invalid_response(format!("bad chunk: {err}")))?;

    let Some(choice) = payload.choices.into_iter().next() else {
        return Ok(None);
    };

    let delta = choice.delta.content.unwrap_or_default();
    let is_final = choice.finish_reason.is_some();
    if delta.is_empty() && !is_final {
        return Ok(None);
    }

    Ok(Some(SseEvent::Chunk(TokenChunk { delta, is_final })))
}

/// Turn a raw byte stream of SSE lines into a [`TokenStream`].
///
/// Chunks are yielded in arrival order; the stream ends at `[DONE]`, at a
/// final chunk, or when the underlying connection closes. Dropping the
/// returned stream drops the byte stream and with it the upstream call.
fn sse_token_stream<S, B, E>(upstream: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let stream = async_stream::stream! {
        let mut upstream = std::pin::pin!(upstream);
        // Raw bytes, not a String: a multi-byte character can be split
        // across network reads, so decoding happens per complete line.
        let mut buffer: Vec<u8> = Vec::new();

        'network: while let Some(next) = upstream.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(err) => {
                    yield Err(LlmError::stream(err.to_string()));
                    return;
                }
            };

            buffer.extend_from_slice(bytes.as_ref());

            while let Some(pos) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = match std::str::from_utf8(&line) {
                    Ok(line) => line,
                    Err(err) => {
                        yield Err(LlmError::invalid_response(format!(
                            "stream is not valid utf-8: {err}"
                        )));
                        return;
                    }
                };
                match parse_sse_line(line) {
                    Ok(Some(SseEvent::Chunk(chunk))) => {
                        let is_final = chunk.is_final;
                        yield Ok(chunk);
                        if is_final {
                            break 'network;
                        }
                    }
                    Ok(Some(SseEvent::Done)) => break 'network,
                    Ok(None) => {}
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }
    };

    Box::pin(stream)
}
