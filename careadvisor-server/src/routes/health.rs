//! Liveness endpoint.

use axum::Json;
use axum::Router;
use axum::routing::get;
use serde::Serialize;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
}

/// GET /healthz
async fn healthz() -> Json<HealthStatus> {
    metrics::counter!("health_checks_total").increment(1);
    Json(HealthStatus { status: "ok" })
}

/// Router for the health check, mounted outside the authenticated API.
pub fn create_health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/healthz", get(healthz))
}
