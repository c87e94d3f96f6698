//! Shared application state handed to every handler.

use crate::auth::session::SessionVerifier;
use crate::services::rate_limit::RateLimiter;
use shared::config::server::Config;
use shared::llms::{ChatModel, ContextBuilder};
use std::sync::Arc;

/// Dependencies shared across the request pipeline.
///
/// The verifier, limiter, and model sit behind trait objects so tests can
/// substitute scripted implementations without touching the router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<dyn SessionVerifier>,
    pub limiter: Arc<dyn RateLimiter>,
    pub model: Arc<dyn ChatModel>,
    pub context: ContextBuilder,
}
