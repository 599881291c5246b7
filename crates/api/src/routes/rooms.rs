//! Room WebSocket endpoints
//!
//! The endpoint authenticates the caller and checks room membership before the
//! room is touched; only then is the connection upgraded and handed to the room.

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use huntroom_shared::RoomKind;
use serde::Deserialize;

use crate::auth::extract_token;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::websocket::{serve_socket, Session};

/// Header carrying the caller's preferred region; informational only
pub const LOCALITY_HINT_HEADER: &str = "x-locality-hint";

#[derive(Debug, Default, Deserialize)]
pub struct RoomQuery {
    pub token: Option<String>,
    /// Presence rooms only
    pub scope: Option<String>,
}

/// GET /api/v1/rooms/:kind/:key/ws
///
/// `kind` is `chat`, `presence` or `notifications`; anything else is a 404.
pub async fn room_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
    Query(query): Query<RoomQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let kind: RoomKind = kind.parse()?;
    upgrade(ws, state, kind, key, query, headers).await
}

async fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    kind: RoomKind,
    key: String,
    query: RoomQuery,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let token = extract_token(query.token.as_deref(), &headers).ok_or(ApiError::Unauthorized)?;
    let caller = state.authenticator.authenticate(&token).await?;

    let hint = headers
        .get(LOCALITY_HINT_HEADER)
        .and_then(|value| value.to_str().ok());
    let room = state.rooms.get_room(kind, &key, hint)?;

    if !state.membership.is_member(&caller, room.address()).await? {
        tracing::warn!(
            room = %room.address(),
            user_id = %caller.identity.id,
            "Room join denied"
        );
        return Err(ApiError::Forbidden);
    }

    let scope = match kind {
        RoomKind::Presence => query.scope,
        RoomKind::Chat | RoomKind::Notification => None,
    };
    let session = Session::new(caller.identity, scope, state.rooms.clock().now_ms());
    let max_frame_bytes = state.config.max_frame_bytes;

    tracing::info!(
        room = %room.address(),
        user_id = %session.identity.id,
        "WebSocket connection upgrade requested"
    );

    // Frames above max_frame_bytes are dropped by the handler, not by the transport
    Ok(ws.on_upgrade(move |socket| serve_socket(socket, room, session, max_frame_bytes)))
}
