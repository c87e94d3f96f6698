//! Session-cookie authentication.
//!
//! Resolves the portal session cookie to a user id and records it on the
//! request context. Handlers decide whether a missing identity is fatal,
//! so unauthenticated requests still flow through here.

use crate::app_state::AppState;
use crate::middleware::request_context::RequestContext;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;
use std::sync::Arc;
use tracing::trace;

/// Pulls the named session cookie out of the request headers.
#[must_use]
pub fn extract_session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let header = headers.get(header::COOKIE)?.to_str().ok()?;

    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
}

/// Attaches the authenticated identity, when present, to the request context.
pub async fn attach_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookie_name = &state.config.session.cookie_name;
    let user_id = extract_session_cookie(request.headers(), cookie_name)
        .and_then(|token| state.verifier.verify(&token));

    trace!(authenticated = user_id.is_some(), "identity resolved");

    if let Some(context) = request.extensions_mut().get_mut::<RequestContext>() {
        context.user_id = user_id;
    } else {
        let mut context = RequestContext::new(String::new());
        context.user_id = user_id;
        request.extensions_mut().insert(context);
    }

    next.run(request).await
}
