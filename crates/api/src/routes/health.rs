//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
    pub active_rooms: usize,
    pub occupied_rooms: usize,
    pub open_sockets: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // Check chat log storage
    let storage_status = match state.rooms.store().ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "Chat storage health check failed");
            "unhealthy"
        }
    };

    let overall_status = if storage_status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let stats = state.rooms.stats();

    (
        overall_status,
        Json(HealthResponse {
            status: storage_status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: storage_status.to_string(),
            active_rooms: stats.active_rooms,
            occupied_rooms: stats.occupied_rooms,
            open_sockets: stats.open_sockets,
        }),
    )
}

/// Liveness probe (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe (checks if the service is ready to accept traffic)
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.rooms.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
