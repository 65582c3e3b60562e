//! HTTP router.
//!
//! Composes all handlers into a single Axum router.

use crate::handlers::{cargo, health, trucks, websocket};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

/// Routes under `/api`.
///
/// - `POST /cargo`, `GET /cargo/unassigned`, `GET|PUT|DELETE /cargo/:id`
/// - `POST /cargo/:id/assign`, `POST /cargo/:id/unassign`
/// - `GET|POST /cargo/:id/events`, `POST /cargo/:id/location`, `GET /cargo/:id/route`
/// - `GET /cargo/track/:tracking_code`
/// - `GET /trucks/:truck_id/cargo`, `GET /trucks/:truck_id/nearby-cargo`,
///   `POST /trucks/:truck_id/location`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/cargo", post(cargo::create))
        .route("/cargo/unassigned", get(cargo::list_unassigned))
        .route("/cargo/track/:tracking_code", get(cargo::track))
        .route(
            "/cargo/:id",
            get(cargo::get).put(cargo::update).delete(cargo::delete),
        )
        .route("/cargo/:id/assign", post(cargo::assign))
        .route("/cargo/:id/unassign", post(cargo::unassign))
        .route(
            "/cargo/:id/events",
            get(cargo::list_events).post(cargo::record_event),
        )
        .route("/cargo/:id/location", post(cargo::update_location))
        .route("/cargo/:id/route", get(cargo::route))
        .route("/trucks/:truck_id/cargo", get(trucks::cargo))
        .route("/trucks/:truck_id/nearby-cargo", get(trucks::nearby_cargo))
        .route("/trucks/:truck_id/location", post(trucks::update_location))
}

/// The full application: API, websocket, probes and the middleware stack.
///
/// ```rust,ignore
/// let state = AppState::new(store, hub, Arc::new(SystemClock), TrackingConfig::default());
/// let listener = tokio::net::TcpListener::bind(addr).await?;
/// axum::serve(listener, build_router(state)).await?;
/// ```
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .route("/ws", get(websocket::handle))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}
