//! API routes

pub mod health;
pub mod notify;
pub mod rooms;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // WebSocket routes (auth handled in the handler via token query parameter or header)
    let room_routes = Router::new()
        .route("/rooms/:kind/:key/ws", get(rooms::room_ws));

    // Server-to-server routes (internal bearer token)
    let internal_routes = Router::new()
        .route("/internal/workspaces/:key/notify", post(notify::notify_workspace))
        .layer(DefaultBodyLimit::max(64 * 1024));

    let api_v1_routes = Router::new().merge(room_routes).merge(internal_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
