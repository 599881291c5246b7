//! Room router
//!
//! Resolves `(kind, key)` to the single actor responsible for it, starting one
//! on first use. Lookup, creation and command delivery all happen under the
//! same map shard lock, so concurrent callers can never end up with two actors
//! for one address.

use huntroom_shared::{Clock, NotificationEvent, RoomAddress, RoomKey, RoomKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::chat::ChatRoom;
use super::connection::PendingSocket;
use super::notification::NotificationRoom;
use super::presence::PresenceRoom;
use super::room::{
    run_actor, ActorHandle, ActorTable, RoomCommand, RoomContext, RoomError, RoomSettings,
    RoomStats,
};
use super::session::Session;
use super::state::SocketTable;
use crate::storage::{ChatStore, StorageError};

/// Lifecycle state of a room address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// No actor running
    Cold,
    /// Actor running with at least one socket
    Active,
    /// Actor running with no sockets
    Idle,
}

/// Process-wide room counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Rooms with a running actor
    pub active_rooms: usize,
    /// Rooms with at least one open socket, whether or not an actor is running
    pub occupied_rooms: usize,
    pub open_sockets: usize,
}

#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    actors: Arc<ActorTable>,
    sockets: SocketTable,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ChatStore>,
    settings: RoomSettings,
    next_instance: AtomicU64,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn ChatStore>, clock: Arc<dyn Clock>, settings: RoomSettings) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                actors: Arc::new(ActorTable::new()),
                sockets: SocketTable::new(),
                clock,
                store,
                settings,
                next_instance: AtomicU64::new(1),
            }),
        }
    }

    /// Handle to the room for `key`
    ///
    /// The locality hint is recorded but never changes which actor serves the room.
    pub fn get_room(
        &self,
        kind: RoomKind,
        key: &str,
        locality_hint: Option<&str>,
    ) -> Result<RoomHandle, RoomError> {
        let address = RoomAddress::new(kind, RoomKey::new(key)?);
        if let Some(hint) = locality_hint {
            tracing::debug!(room = %address, hint, "Locality hint received");
        }
        Ok(self.handle(address))
    }

    pub fn handle(&self, address: RoomAddress) -> RoomHandle {
        RoomHandle {
            address,
            registry: self.clone(),
        }
    }

    /// Relay a server-side event to every socket of a notification room
    pub fn notify(&self, key: &str, event: NotificationEvent) -> Result<(), RoomError> {
        self.get_room(RoomKind::Notification, key, None)?
            .broadcast(event)
    }

    /// Route an alarm to every chat room whose deadline has passed
    ///
    /// Returns how many rooms were signalled.
    pub async fn fire_due_alarms(&self) -> Result<usize, StorageError> {
        let now = self.inner.clock.now_ms();
        let due = self.inner.store.due_alarms(now).await?;

        let mut fired = 0;
        for room in due {
            let key = match RoomKey::new(room.clone()) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(room = %room, error = %e, "Skipping alarm for invalid room key");
                    continue;
                }
            };
            let address = RoomAddress::new(RoomKind::Chat, key);
            match self.dispatch(&address, RoomCommand::Alarm) {
                Ok(()) => fired += 1,
                Err(e) => tracing::error!(room = %address, error = %e, "Failed to deliver alarm"),
            }
        }

        Ok(fired)
    }

    pub fn room_state(&self, address: &RoomAddress) -> RoomState {
        if !self.inner.actors.contains_key(address) {
            RoomState::Cold
        } else if self.inner.sockets.socket_count(address) > 0 {
            RoomState::Active
        } else {
            RoomState::Idle
        }
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_rooms: self.inner.actors.len(),
            occupied_rooms: self.inner.sockets.room_count(),
            open_sockets: self.inner.sockets.total_sockets(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.inner.store
    }

    /// Deliver a command, starting the actor if the address is cold
    fn dispatch(&self, address: &RoomAddress, mut command: RoomCommand) -> Result<(), RoomError> {
        // A second pass only happens when the first actor died without retiring
        for _ in 0..2 {
            let entry = self
                .inner
                .actors
                .entry(address.clone())
                .or_insert_with(|| self.spawn_actor(address));
            let sent = entry.tx.send(command);
            drop(entry);

            match sent {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => {
                    tracing::warn!(room = %address, "Room actor stopped unexpectedly, restarting");
                    self.inner
                        .actors
                        .remove_if(address, |_, handle| handle.tx.is_closed());
                    command = returned;
                }
            }
        }

        Err(RoomError::Unavailable(address.to_string()))
    }

    fn spawn_actor(&self, address: &RoomAddress) -> ActorHandle {
        let instance_id = self.inner.next_instance.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = RoomContext::new(
            address.clone(),
            self.inner.sockets.clone(),
            Arc::clone(&self.inner.clock),
            Arc::clone(&self.inner.store),
            self.inner.settings,
        );
        let actors = Arc::clone(&self.inner.actors);

        match address.kind {
            RoomKind::Chat => {
                tokio::spawn(run_actor(ChatRoom::new(), ctx, instance_id, rx, actors));
            }
            RoomKind::Presence => {
                tokio::spawn(run_actor(PresenceRoom, ctx, instance_id, rx, actors));
            }
            RoomKind::Notification => {
                tokio::spawn(run_actor(NotificationRoom, ctx, instance_id, rx, actors));
            }
        }

        ActorHandle { instance_id, tx }
    }
}

/// Address of one room, resolved through the registry on every call
///
/// Holding a handle does not keep the actor alive; a retired room is restarted
/// by the next call.
#[derive(Clone)]
pub struct RoomHandle {
    address: RoomAddress,
    registry: RoomRegistry,
}

impl RoomHandle {
    pub fn address(&self) -> &RoomAddress {
        &self.address
    }

    /// Attach an upgraded socket and wait for the room's accept logic to finish
    pub async fn accept(&self, socket: PendingSocket, session: Session) -> Result<Uuid, RoomError> {
        let socket_id = socket.id;
        let (reply, accepted) = oneshot::channel();
        self.registry.dispatch(
            &self.address,
            RoomCommand::Accept {
                socket,
                session,
                reply,
            },
        )?;

        accepted
            .await
            .map_err(|_| RoomError::Unavailable(self.address.to_string()))??;
        Ok(socket_id)
    }

    pub fn message(&self, socket_id: Uuid, payload: impl Into<String>) -> Result<(), RoomError> {
        self.registry.dispatch(
            &self.address,
            RoomCommand::Message {
                socket_id,
                payload: payload.into(),
            },
        )
    }

    pub fn disconnect(&self, socket_id: Uuid) -> Result<(), RoomError> {
        self.registry
            .dispatch(&self.address, RoomCommand::Disconnect { socket_id })
    }

    pub fn broadcast(&self, event: NotificationEvent) -> Result<(), RoomError> {
        self.registry
            .dispatch(&self.address, RoomCommand::Broadcast { event })
    }

    pub fn alarm(&self) -> Result<(), RoomError> {
        self.registry.dispatch(&self.address, RoomCommand::Alarm)
    }

    /// Ask the actor to retire once its queue drains; sockets stay open
    pub fn hibernate(&self) -> Result<(), RoomError> {
        if !self.registry.inner.actors.contains_key(&self.address) {
            return Ok(());
        }
        self.registry.dispatch(&self.address, RoomCommand::Hibernate)
    }

    pub async fn stats(&self) -> Result<RoomStats, RoomError> {
        let (reply, stats) = oneshot::channel();
        self.registry
            .dispatch(&self.address, RoomCommand::Stats { reply })?;
        stats
            .await
            .map_err(|_| RoomError::Unavailable(self.address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryChatStore;
    use crate::websocket::Frame;
    use huntroom_shared::{Identity, ManualClock};
    use serde_json::Value;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(
            Arc::new(MemoryChatStore::new()),
            Arc::new(ManualClock::new(1_000)),
            RoomSettings::default(),
        )
    }

    /// Register a socket directly in the table, bypassing the room's accept
    fn insert_raw(
        registry: &RoomRegistry,
        address: &RoomAddress,
        attachment: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<Frame>) {
        let (socket, frames) = PendingSocket::channel();
        let id = socket.id;
        registry
            .inner
            .sockets
            .insert(address, socket.accept(attachment.to_string(), 1_000));
        (id, frames)
    }

    #[tokio::test]
    async fn test_undecodable_attachments_are_skipped_by_presence() {
        let registry = registry();
        let room = registry.get_room(RoomKind::Presence, "w1", None).unwrap();
        let chat_attachment = Session::new(Identity::new("intruder"), None, 1_000)
            .encode_attachment(RoomKind::Chat)
            .unwrap();
        let _garbled = insert_raw(&registry, room.address(), "{not json");
        let _wrong_kind = insert_raw(&registry, room.address(), &chat_attachment);

        let (socket, mut frames) = PendingSocket::channel();
        room.accept(socket, Session::new(Identity::new("u1"), Some("A".to_string()), 1_000))
            .await
            .unwrap();

        let snapshot: Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
        let scopes = snapshot.as_object().unwrap();
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes["A"].as_array().unwrap().len(), 1);
        assert_eq!(scopes["A"][0]["id"], "u1");

        assert_eq!(room.stats().await.unwrap().sessions, 1);
        assert_eq!(registry.stats().open_sockets, 3);
    }

    #[tokio::test]
    async fn test_chat_message_from_undecodable_socket_is_dropped() {
        let registry = registry();
        let room = registry.get_room(RoomKind::Chat, "p1", None).unwrap();
        let (bad_id, _bad_frames) = insert_raw(&registry, room.address(), "{\"kind\":42}");

        let (socket, mut frames) = PendingSocket::channel();
        room.accept(socket, Session::new(Identity::new("u1"), None, 1_000))
            .await
            .unwrap();
        // Replay
        assert_eq!(&*frames.recv().await.unwrap(), "[]");

        room.message(bad_id, r#"{"text":"hi"}"#).unwrap();
        assert_eq!(room.stats().await.unwrap().sessions, 1);

        assert!(frames.try_recv().is_err());
        assert!(registry.store().load_log("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected_before_routing() {
        let registry = registry();
        assert!(matches!(
            registry.get_room(RoomKind::Chat, "", None),
            Err(RoomError::InvalidKey(_))
        ));
        assert!(matches!(
            registry.get_room(RoomKind::Chat, "bad\nkey", None),
            Err(RoomError::InvalidKey(_))
        ));
        assert_eq!(registry.stats().active_rooms, 0);
    }

    #[tokio::test]
    async fn test_locality_hint_does_not_change_routing() {
        let registry = registry();
        let east = registry.get_room(RoomKind::Chat, "p1", Some("weur")).unwrap();
        let west = registry.get_room(RoomKind::Chat, "p1", Some("wnam")).unwrap();

        let a = east.stats().await.unwrap();
        let b = west.stats().await.unwrap();
        assert_eq!(a.instance_id, b.instance_id);
        assert_eq!(registry.stats().active_rooms, 1);
    }

    #[tokio::test]
    async fn test_room_state_transitions() {
        let registry = registry();
        let room = registry.get_room(RoomKind::Presence, "w1", None).unwrap();
        assert_eq!(registry.room_state(room.address()), RoomState::Cold);

        let (socket, _frames) = PendingSocket::channel();
        let socket_id = room
            .accept(socket, Session::new(Identity::new("u1"), None, 1_000))
            .await
            .unwrap();
        assert_eq!(registry.room_state(room.address()), RoomState::Active);

        room.disconnect(socket_id).unwrap();
        let stats = room.stats().await.unwrap();
        assert_eq!(stats.sessions, 0);
        assert_eq!(registry.room_state(room.address()), RoomState::Idle);

        room.hibernate().unwrap();
        while registry.room_state(room.address()) != RoomState::Cold {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_hibernated_room_still_counts_as_occupied() {
        let registry = registry();
        let room = registry.get_room(RoomKind::Presence, "w1", None).unwrap();
        let (socket, _frames) = PendingSocket::channel();
        room.accept(socket, Session::new(Identity::new("u1"), None, 1_000))
            .await
            .unwrap();

        room.hibernate().unwrap();
        while registry.room_state(room.address()) != RoomState::Cold {
            tokio::task::yield_now().await;
        }

        let stats = registry.stats();
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(stats.occupied_rooms, 1);
        assert_eq!(stats.open_sockets, 1);
    }

    #[tokio::test]
    async fn test_kinds_are_separate_rooms() {
        let registry = registry();
        let chat = registry.get_room(RoomKind::Chat, "k", None).unwrap();
        let presence = registry.get_room(RoomKind::Presence, "k", None).unwrap();

        let a = chat.stats().await.unwrap();
        let b = presence.stats().await.unwrap();
        assert_ne!(a.instance_id, b.instance_id);
        assert_eq!(registry.stats().active_rooms, 2);
    }
}
