//! Per-request context: request id assignment and identity carriage.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, Request};
use axum::middleware::Next;
use axum::response::Response;
use shared::config::server::Config;
use std::str::FromStr;
use uuid::Uuid;

/// Context attached to every request as an extension.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id echoed back in the response headers.
    pub request_id: String,
    /// Authenticated user, filled in by the identity middleware.
    pub user_id: Option<Uuid>,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            user_id: None,
        }
    }
}

/// State for the request-id middleware: which header carries the id.
#[derive(Clone)]
pub struct RequestIdState {
    header: HeaderName,
}

impl RequestIdState {
    /// # Panics
    /// Never panics for a validated configuration; falls back to
    /// `x-request-id` if the configured header name is not parseable.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let header = HeaderName::from_str(&config.server.request_id_header)
            .unwrap_or(HeaderName::from_static("x-request-id"));
        Self { header }
    }
}

/// Assigns a request id, honoring one supplied by the caller, and echoes it
/// back on the response.
pub async fn assign_request_id(
    State(state): State<RequestIdState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(&state.header)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);

    request
        .extensions_mut()
        .insert(RequestContext::new(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert(state.header.clone(), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = Config::with_defaults();
        let state = RequestIdState::from_config(&config);
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(state, assign_request_id))
    }

    #[tokio::test]
    async fn generates_request_id_when_absent() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers().get("x-request-id").unwrap();
        assert!(Uuid::parse_str(header.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn echoes_caller_supplied_request_id() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "caller-id-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let header = response.headers().get("x-request-id").unwrap();
        assert_eq!(header, "caller-id-42");
    }
}
