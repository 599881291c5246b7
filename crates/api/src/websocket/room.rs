//! Room actor core
//!
//! Every room address is served by at most one actor: a tokio task draining a
//! single-consumer command queue. Commands for one room are handled strictly
//! one at a time, which is the only synchronization room state needs.
//!
//! Actors hold no sessions. Everything a room knows about its connections is
//! read back from the [`SocketTable`] attachments, so an actor can retire while
//! its sockets stay open and a fresh instance picks up where it left off.

use async_trait::async_trait;
use dashmap::DashMap;
use huntroom_shared::{Clock, HuntError, NotificationEvent, RoomAddress};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::connection::PendingSocket;
use super::events;
use super::session::{Session, SessionError};
use super::state::{BroadcastReport, SocketTable};
use crate::config::DEFAULT_CHAT_RETENTION_SECS;
use crate::storage::ChatStore;

/// Work item for a room actor
#[derive(Debug)]
pub enum RoomCommand {
    /// Register an upgraded socket and run the room's accept logic
    Accept {
        socket: PendingSocket,
        session: Session,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Text frame received from a socket
    Message { socket_id: Uuid, payload: String },
    /// Socket closed
    Disconnect { socket_id: Uuid },
    /// Scheduled expiry wake-up
    Alarm,
    /// Server-side event to relay
    Broadcast { event: NotificationEvent },
    Stats { reply: oneshot::Sender<RoomStats> },
    /// Retire the actor as soon as its queue is empty
    Hibernate,
}

/// Snapshot of a running actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStats {
    pub instance_id: u64,
    pub sessions: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    InvalidKey(#[from] HuntError),
    #[error("Room {0} is unavailable")]
    Unavailable(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Tunables shared by every room
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    /// Silence after which a chat log is deleted
    pub chat_retention: Duration,
    /// Inactivity after which an actor retires
    pub idle_timeout: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            chat_retention: Duration::from_secs(DEFAULT_CHAT_RETENTION_SECS),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Registry entry for a running actor
#[derive(Debug, Clone)]
pub(crate) struct ActorHandle {
    pub instance_id: u64,
    pub tx: mpsc::UnboundedSender<RoomCommand>,
}

pub(crate) type ActorTable = DashMap<RoomAddress, ActorHandle>;

/// Everything a room behavior may touch while handling a command
pub struct RoomContext {
    pub address: RoomAddress,
    sockets: SocketTable,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ChatStore>,
    pub settings: RoomSettings,
}

impl RoomContext {
    pub(crate) fn new(
        address: RoomAddress,
        sockets: SocketTable,
        clock: Arc<dyn Clock>,
        store: Arc<dyn ChatStore>,
        settings: RoomSettings,
    ) -> Self {
        Self {
            address,
            sockets,
            clock,
            store,
            settings,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn store(&self) -> &dyn ChatStore {
        self.store.as_ref()
    }

    pub fn key(&self) -> &str {
        self.address.key.as_str()
    }

    /// Sessions of every open socket, decoded from their attachments
    ///
    /// Sockets whose attachment does not decode for this room kind are skipped.
    pub fn sessions(&self) -> Vec<(Uuid, Session)> {
        self.sockets
            .attachments(&self.address)
            .into_iter()
            .filter_map(|(socket_id, _, raw)| {
                match Session::decode_attachment(self.address.kind, &raw) {
                    Ok(session) => Some((socket_id, session)),
                    Err(e) => {
                        tracing::warn!(
                            room = %self.address,
                            socket_id = %socket_id,
                            error = %e,
                            "Ignoring socket with invalid attachment"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Session of one socket, if it is open and its attachment is valid
    pub fn session(&self, socket_id: &Uuid) -> Option<Session> {
        let raw = self.sockets.attachment(&self.address, socket_id)?;
        match Session::decode_attachment(self.address.kind, &raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(
                    room = %self.address,
                    socket_id = %socket_id,
                    error = %e,
                    "Ignoring socket with invalid attachment"
                );
                None
            }
        }
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.socket_count(&self.address)
    }

    /// Serialize once and send to every socket of the room
    pub fn broadcast<T: Serialize + ?Sized>(&self, payload: &T) -> BroadcastReport {
        match events::encode(payload) {
            Some(frame) => self.sockets.broadcast(&self.address, &frame),
            None => BroadcastReport::default(),
        }
    }

    pub fn send_to<T: Serialize + ?Sized>(&self, socket_id: &Uuid, payload: &T) -> bool {
        match events::encode(payload) {
            Some(frame) => self.sockets.send_to(&self.address, socket_id, frame),
            None => false,
        }
    }

    fn attach(&self, socket: PendingSocket, session: &Session) -> Result<Uuid, RoomError> {
        let attachment = session.encode_attachment(self.address.kind)?;
        let socket_id = socket.id;
        self.sockets
            .insert(&self.address, socket.accept(attachment, session.connected_at));
        Ok(socket_id)
    }

    fn detach(&self, socket_id: &Uuid) -> bool {
        self.sockets.remove(&self.address, socket_id).is_some()
    }
}

/// Room specialization plugged into the shared actor loop
#[async_trait]
pub trait RoomBehavior: Send + 'static {
    /// Runs once when the actor instance starts, before any command
    async fn on_start(&mut self, _ctx: &RoomContext) {}

    /// The socket is already registered when this runs
    async fn on_accept(&mut self, ctx: &RoomContext, socket_id: Uuid, session: &Session);

    async fn on_message(&mut self, ctx: &RoomContext, socket_id: Uuid, _payload: &str) {
        tracing::debug!(
            room = %ctx.address,
            socket_id = %socket_id,
            "Room does not accept client messages, dropping frame"
        );
    }

    /// The socket is already removed when this runs
    async fn on_disconnect(&mut self, _ctx: &RoomContext, _socket_id: Uuid) {}

    async fn on_alarm(&mut self, ctx: &RoomContext) {
        tracing::debug!(room = %ctx.address, "Room has no alarm handler");
    }

    async fn on_broadcast(&mut self, ctx: &RoomContext, _event: &NotificationEvent) {
        tracing::debug!(room = %ctx.address, "Room does not relay broadcasts");
    }
}

/// Drain the room's command queue until the actor retires
pub(crate) async fn run_actor<B: RoomBehavior>(
    mut behavior: B,
    ctx: RoomContext,
    instance_id: u64,
    mut rx: mpsc::UnboundedReceiver<RoomCommand>,
    actors: Arc<ActorTable>,
) {
    tracing::debug!(room = %ctx.address, instance_id, "Room actor started");
    behavior.on_start(&ctx).await;

    let mut hibernating = false;
    loop {
        let wait = if hibernating {
            Duration::ZERO
        } else {
            ctx.settings.idle_timeout
        };

        let next = tokio::time::timeout(wait, rx.recv()).await;
        match next {
            Ok(Some(RoomCommand::Hibernate)) => hibernating = true,
            Ok(Some(command)) => handle_command(&mut behavior, &ctx, instance_id, command).await,
            Ok(None) => break,
            Err(_) => {
                if retire(&actors, &ctx.address, instance_id, &rx) {
                    break;
                }
            }
        }
    }

    tracing::debug!(
        room = %ctx.address,
        instance_id,
        open_sockets = ctx.socket_count(),
        "Room actor retired"
    );
}

/// Remove this instance from the registry if nothing is queued for it
///
/// Runs under the registry's shard lock, which is also held while commands are
/// routed, so a command either lands before this check or finds no actor.
fn retire(
    actors: &ActorTable,
    address: &RoomAddress,
    instance_id: u64,
    rx: &mpsc::UnboundedReceiver<RoomCommand>,
) -> bool {
    if actors
        .remove_if(address, |_, handle| {
            handle.instance_id == instance_id && rx.is_empty()
        })
        .is_some()
    {
        return true;
    }

    // Replaced by another instance: nothing can reach this queue anymore
    !actors
        .get(address)
        .is_some_and(|handle| handle.instance_id == instance_id)
}

async fn handle_command<B: RoomBehavior>(
    behavior: &mut B,
    ctx: &RoomContext,
    instance_id: u64,
    command: RoomCommand,
) {
    match command {
        RoomCommand::Accept {
            socket,
            session,
            reply,
        } => match ctx.attach(socket, &session) {
            Ok(socket_id) => {
                tracing::info!(
                    room = %ctx.address,
                    socket_id = %socket_id,
                    user_id = %session.identity.id,
                    "Socket accepted"
                );
                behavior.on_accept(ctx, socket_id, &session).await;
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                tracing::warn!(room = %ctx.address, error = %e, "Socket rejected");
                let _ = reply.send(Err(e));
            }
        },
        RoomCommand::Message { socket_id, payload } => {
            if ctx.sockets.attachment(&ctx.address, &socket_id).is_none() {
                tracing::debug!(
                    room = %ctx.address,
                    socket_id = %socket_id,
                    "Dropping message from unknown socket"
                );
                return;
            }
            behavior.on_message(ctx, socket_id, &payload).await;
        }
        RoomCommand::Disconnect { socket_id } => {
            if ctx.detach(&socket_id) {
                tracing::info!(room = %ctx.address, socket_id = %socket_id, "Socket disconnected");
                behavior.on_disconnect(ctx, socket_id).await;
            }
        }
        RoomCommand::Alarm => behavior.on_alarm(ctx).await,
        RoomCommand::Broadcast { event } => behavior.on_broadcast(ctx, &event).await,
        RoomCommand::Stats { reply } => {
            let _ = reply.send(RoomStats {
                instance_id,
                sessions: ctx.sessions().len(),
            });
        }
        // Handled by the loop
        RoomCommand::Hibernate => {}
    }
}
