//! The chat endpoint: admission, context assembly, and the streaming relay.
//!
//! A request passes three gates in order: identity, input validation, then
//! the rate limiter. Validation runs before the quota check so a request
//! that would be rejected anyway never consumes a slot. Admitted requests
//! stream the model's reply token-by-token as plain text.

use crate::app_state::AppState;
use crate::http::error::{ApiError, AppResult};
use crate::middleware::request_context::RequestContext;
use crate::services::rate_limit::RateDecision;
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Extension, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use futures_util::{Stream, StreamExt};
use shared::llms::{CompletionRequest, LlmError, TokenStream};
use shared::models::chat::ChatRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Body shown to clients when the upstream model call fails. The actual
/// failure is logged server-side and never forwarded.
const UPSTREAM_FAILURE_MESSAGE: &str =
    "Something went wrong while generating a response. Please try again.";

/// POST /api/chat
///
/// Streams the advisor's reply as `text/plain` chunks in generation order.
/// Rejections render as the JSON error body with the matching status code.
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Json(payload): Json<ChatRequest>,
) -> AppResult<Response> {
    let Some(user_id) = context.user_id else {
        metrics::counter!("chat_requests_total", "outcome" => "unauthorized").increment(1);
        return Err(ApiError::unauthorized());
    };

    validate_message(&payload.message, state.config.limits.input_max_chars).map_err(
        |err| {
            metrics::counter!("chat_requests_total", "outcome" => "invalid").increment(1);
            err
        },
    )?;

    if let RateDecision::Denied { retry_after } =
        state.limiter.check(&user_id.to_string()).await
    {
        info!(user = %user_id, retry_after, "request rejected by rate limiter");
        metrics::counter!("chat_requests_total", "outcome" => "rate_limited").increment(1);
        return Err(ApiError::too_many_requests(retry_after));
    }

    let messages = state
        .context
        .assemble(&payload.conversation_history, payload.message.trim());
    let request = CompletionRequest::new(state.config.llm.model.clone(), messages)
        .with_temperature(state.config.llm.temperature)
        .with_max_tokens(state.config.llm.max_output_tokens);

    let upstream = state.model.stream_chat(request).await.map_err(|err| {
        warn!(user = %user_id, error = %err, "upstream completion call failed");
        metrics::counter!("chat_requests_total", "outcome" => "upstream_error").increment(1);
        ApiError::internal_server_error(UPSTREAM_FAILURE_MESSAGE)
    })?;

    info!(
        user = %user_id,
        request_id = %context.request_id,
        model = state.model.model_name(),
        "streaming advisor reply"
    );
    metrics::counter!("chat_requests_total", "outcome" => "admitted").increment(1);

    let deadline = Duration::from_secs(state.config.llm.stream_deadline_seconds);
    let body = Body::from_stream(relay_stream(upstream, deadline));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .map_err(|err| ApiError::internal_server_error(err.to_string()))
}

/// Rejects empty and over-length messages before any quota is spent.
fn validate_message(message: &str, max_chars: usize) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required."));
    }

    if message.chars().count() > max_chars {
        return Err(ApiError::bad_request(format!(
            "Message exceeds the {max_chars} character limit."
        )));
    }

    Ok(())
}

/// Forwards token deltas to the client as they arrive, in order, without
/// buffering. The whole stream must finish before `deadline` elapses; a
/// stall past it ends the body with an error, which drops the upstream
/// stream and with it the in-flight completion.
fn relay_stream(
    upstream: TokenStream,
    deadline: Duration,
) -> impl Stream<Item = Result<Bytes, LlmError>> {
    async_stream::stream! {
        let cutoff = tokio::time::Instant::now() + deadline;
        let mut upstream = upstream;

        loop {
            let next = match tokio::time::timeout_at(cutoff, upstream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(seconds = deadline.as_secs(), "streaming deadline exceeded");
                    metrics::counter!("chat_stream_failures_total", "reason" => "deadline")
                        .increment(1);
                    yield Err(LlmError::Timeout {
                        seconds: deadline.as_secs(),
                    });
                    break;
                }
            };

            match next {
                None => break,
                Some(Ok(chunk)) => {
                    if !chunk.delta.is_empty() {
                        yield Ok(Bytes::from(chunk.delta));
                    }
                    if chunk.is_final {
                        break;
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "upstream stream failed mid-flight");
                    metrics::counter!("chat_stream_failures_total", "reason" => "upstream")
                        .increment(1);
                    yield Err(err);
                    break;
                }
            }
        }
    }
}
