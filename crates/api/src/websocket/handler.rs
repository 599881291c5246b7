//! Per-connection WebSocket pump
//!
//! Bridges one upgraded axum socket to its room: outbound frames from the
//! room's channel are written by a dedicated task, inbound frames are forwarded
//! to the room actor, and the close is reported once the stream ends.

use axum::extract::ws::{Message, WebSocket};
use futures::{stream::StreamExt, SinkExt};
use uuid::Uuid;

use super::connection::PendingSocket;
use super::registry::RoomHandle;
use super::session::Session;

/// Run an accepted upgrade until the client goes away
pub async fn serve_socket(
    socket: WebSocket,
    room: RoomHandle,
    session: Session,
    max_frame_bytes: usize,
) {
    let (mut sender, mut receiver) = socket.split();
    let (pending, mut rx) = PendingSocket::channel();

    let socket_id = match room.accept(pending, session).await {
        Ok(socket_id) => socket_id,
        Err(e) => {
            tracing::warn!(room = %room.address(), error = %e, "Room refused socket");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    // Spawn task to write room frames to the client
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                break; // Connection closed
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(socket_id = %socket_id, error = %e, "WebSocket read error");
                break;
            }
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(socket_id = %socket_id, "Dropping non UTF-8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                tracing::debug!(socket_id = %socket_id, "WebSocket close frame received");
                break;
            }
            // Axum answers pings itself
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if !forward(&room, socket_id, text, max_frame_bytes) {
            break;
        }
    }

    if let Err(e) = room.disconnect(socket_id) {
        tracing::error!(room = %room.address(), socket_id = %socket_id, error = %e, "Failed to report disconnect");
    }
    send_task.abort();
}

/// Hand a text frame to the room; false if the room can no longer be reached
fn forward(room: &RoomHandle, socket_id: Uuid, text: String, max_frame_bytes: usize) -> bool {
    if text.len() > max_frame_bytes {
        tracing::debug!(
            room = %room.address(),
            socket_id = %socket_id,
            size = text.len(),
            "Dropping oversized frame"
        );
        return true;
    }

    match room.message(socket_id, text) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(room = %room.address(), socket_id = %socket_id, error = %e, "Failed to route message");
            false
        }
    }
}
