//! Real-time rooms over WebSocket
//!
//! Provides the room runtime behind the chat, presence and notification
//! endpoints:
//! - Chat rooms with a durable, ordered log that expires after a silence window
//! - Presence rooms aggregating who is connected under which scope
//! - Notification rooms relaying server-side events to every socket
//!
//! # Architecture
//!
//! - **Registry**: routes `(kind, key)` to exactly one running actor, creating it on demand
//! - **Room**: the shared actor loop and the [`RoomBehavior`] hooks each kind implements
//! - **Session**: per-socket identity and scope, stored as a serialized attachment
//! - **State**: the socket table holding live sockets and their attachments
//! - **Handler**: pumps frames between an axum socket and its room
//! - **Alarm**: background sweeper delivering due chat expiry alarms
//! - **Events**: wire payloads

pub mod alarm;
pub mod chat;
pub mod connection;
pub mod events;
pub mod handler;
pub mod notification;
pub mod presence;
pub mod registry;
pub mod room;
pub mod session;
pub mod state;

pub use alarm::spawn_alarm_sweeper;
pub use connection::{Frame, PendingSocket};
pub use handler::serve_socket;
pub use registry::{RegistryStats, RoomHandle, RoomRegistry, RoomState};
pub use room::{RoomBehavior, RoomContext, RoomError, RoomSettings, RoomStats};
pub use session::{Session, SessionError};
pub use state::SocketTable;
