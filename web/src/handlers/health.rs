//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use fleetops_runtime::{health, HealthReport};

/// Liveness probe.
///
/// Returns 200 OK while the process is serving. Dependencies are not checked.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness probe.
///
/// Pings the store and reports the hub's observer count.
///
/// - 200 OK: healthy or degraded
/// - 503 Service Unavailable: unhealthy
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = health::readiness(state.store.as_ref(), &state.hub, state.clock.now()).await;

    let status = if report.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(report))
}
