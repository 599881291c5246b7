//! Internal server-side notification entrypoint

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use huntroom_shared::NotificationEvent;
use subtle::ConstantTimeEq;

use crate::auth::extract_token;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/v1/internal/workspaces/:key/notify
///
/// Fire-and-forget: 202 means the event was queued for the room, not delivered.
pub async fn notify_workspace(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(event): Json<NotificationEvent>,
) -> ApiResult<StatusCode> {
    verify_internal_token(&headers, &state.config.internal_api_token)?;

    state.rooms.notify(&key, event)?;
    tracing::debug!(workspace = %key, "Notification queued");

    Ok(StatusCode::ACCEPTED)
}

/// Compare the bearer token with the configured internal token in constant time
fn verify_internal_token(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let provided = extract_token(None, headers).ok_or(ApiError::Unauthorized)?;
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!("Internal notify call with invalid token");
        Err(ApiError::Unauthorized)
    }
}
