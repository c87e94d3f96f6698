//! API error type rendered as the chat endpoint's JSON error body.
//!
//! Every failure leaves the server as `{ "error": "..." }`, with
//! `"rateLimited": true` added on quota rejections and a `Retry-After`
//! header naming the seconds until the window resets.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use shared::models::chat::ChatErrorBody;
use thiserror::Error;

/// Result alias used by handlers.
pub type AppResult<T> = Result<T, ApiError>;

/// An error that renders as the endpoint's JSON error contract.
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
    rate_limited: bool,
    retry_after: Option<u64>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            rate_limited: false,
            retry_after: None,
        }
    }

    /// 401 with a fixed body; no detail about why the session failed.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// 400 carrying the concrete validation failure.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 429 with the `rateLimited` marker and a retry hint in seconds.
    #[must_use]
    pub fn too_many_requests(retry_after: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: format!(
                "Rate limit exceeded. Try again in {retry_after} seconds."
            ),
            rate_limited: true,
            retry_after: Some(retry_after),
        }
    }

    /// 500 with a generic body; the real cause stays in the server logs.
    #[must_use]
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = if self.rate_limited {
            ChatErrorBody::rate_limited(self.message)
        } else {
            ChatErrorBody::new(self.message)
        };

        let mut response = (self.status, Json(body)).into_response();

        if let Some(seconds) = self.retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_renders_fixed_body() {
        let response = ApiError::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({ "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn bad_request_carries_the_message() {
        let response = ApiError::bad_request("Message is required.").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Message is required.");
        assert!(json.get("rateLimited").is_none());
    }

    #[tokio::test]
    async fn too_many_requests_sets_marker_and_retry_after() {
        let response = ApiError::too_many_requests(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );

        let json = body_json(response).await;
        assert_eq!(json["rateLimited"], true);
        assert!(
            json["error"].as_str().unwrap().contains("42"),
            "message should name the retry delay: {json}"
        );
    }

    #[tokio::test]
    async fn internal_error_body_is_generic() {
        let response =
            ApiError::internal_server_error("Something went wrong.").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Something went wrong.");
    }
}
