//! Socket table: live connections per room
//!
//! The table belongs to the transport layer, not to any room actor. It keeps
//! every accepted socket together with its session attachment, so actors can
//! be torn down and recreated while their sockets stay open.

use dashmap::DashMap;
use huntroom_shared::RoomAddress;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::connection::{Frame, LiveSocket};

/// Live sockets indexed by room, then by socket id
#[derive(Clone, Default)]
pub struct SocketTable {
    rooms: Arc<DashMap<RoomAddress, HashMap<Uuid, LiveSocket>>>,
}

/// Outcome of a room broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub failed: usize,
}

impl SocketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted socket
    pub fn insert(&self, address: &RoomAddress, socket: LiveSocket) {
        let mut sockets = self.rooms.entry(address.clone()).or_default();
        let socket_id = socket.id;
        sockets.insert(socket_id, socket);

        tracing::debug!(
            room = %address,
            socket_id = %socket_id,
            room_size = sockets.len(),
            "Socket added to room"
        );
    }

    /// Remove a socket, dropping the room entry once it is empty
    pub fn remove(&self, address: &RoomAddress, socket_id: &Uuid) -> Option<LiveSocket> {
        let removed = self
            .rooms
            .get_mut(address)
            .and_then(|mut sockets| sockets.remove(socket_id));
        self.rooms.remove_if(address, |_, sockets| sockets.is_empty());

        if removed.is_some() {
            tracing::debug!(
                room = %address,
                socket_id = %socket_id,
                remaining = self.socket_count(address),
                "Socket removed from room"
            );
        }
        removed
    }

    /// Attachment of one socket
    pub fn attachment(&self, address: &RoomAddress, socket_id: &Uuid) -> Option<String> {
        self.rooms
            .get(address)
            .and_then(|sockets| sockets.get(socket_id).map(|s| s.attachment().to_string()))
    }

    /// `(socket id, opened at, attachment)` for every socket of the room
    pub fn attachments(&self, address: &RoomAddress) -> Vec<(Uuid, i64, String)> {
        self.rooms
            .get(address)
            .map(|sockets| {
                sockets
                    .values()
                    .map(|s| (s.id, s.opened_at, s.attachment().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Send a frame to one socket
    pub fn send_to(&self, address: &RoomAddress, socket_id: &Uuid, frame: Frame) -> bool {
        self.rooms
            .get(address)
            .and_then(|sockets| sockets.get(socket_id).map(|s| s.send(frame)))
            .unwrap_or(false)
    }

    /// Send a frame to every socket of the room
    ///
    /// Silently counts send errors (closed sockets are removed when their
    /// disconnect is processed)
    pub fn broadcast(&self, address: &RoomAddress, frame: &Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if let Some(sockets) = self.rooms.get(address) {
            for socket in sockets.values() {
                if socket.send(Arc::clone(frame)) {
                    report.recipients += 1;
                } else {
                    report.failed += 1;
                    tracing::warn!(
                        room = %address,
                        socket_id = %socket.id,
                        "Failed to send frame to socket (likely closed)"
                    );
                }
            }
        }
        report
    }

    /// Number of sockets in a room
    pub fn socket_count(&self, address: &RoomAddress) -> usize {
        self.rooms.get(address).map(|s| s.len()).unwrap_or(0)
    }

    /// Number of rooms with at least one socket
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of sockets across all rooms
    pub fn total_sockets(&self) -> usize {
        self.rooms.iter().map(|entry| entry.value().len()).sum()
    }
}
