//! Durable chat log storage
//!
//! Each chat room owns an append-only log keyed so that lexicographic key
//! order equals processing order, plus at most one pending expiry alarm.
//! Only the chat room actor for a given room reads or writes its rows.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use huntroom_shared::ChatMessage;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence contract for chat rooms
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append one message under its ordered key
    async fn append(&self, room: &str, key: &str, message: &ChatMessage) -> Result<(), StorageError>;

    /// Full log in key order
    async fn load_log(&self, room: &str) -> Result<Vec<ChatMessage>, StorageError>;

    /// Greatest key currently stored for the room
    async fn last_key(&self, room: &str) -> Result<Option<String>, StorageError>;

    /// Delete every message of the room, returning how many were removed
    async fn delete_log(&self, room: &str) -> Result<u64, StorageError>;

    /// Arm (or re-arm) the room's single expiry alarm
    async fn set_alarm(&self, room: &str, fire_at_ms: i64) -> Result<(), StorageError>;

    async fn alarm(&self, room: &str) -> Result<Option<i64>, StorageError>;

    async fn clear_alarm(&self, room: &str) -> Result<(), StorageError>;

    /// Rooms whose alarm deadline is at or before `now_ms`
    async fn due_alarms(&self, now_ms: i64) -> Result<Vec<String>, StorageError>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<(), StorageError>;
}

/// Build a message key: zero-padded timestamp, per-millisecond sequence, random suffix
pub fn message_key(timestamp_ms: i64, sequence: u32, suffix: u32) -> String {
    format!("{:016}-{:06}-{:08x}", timestamp_ms.max(0), sequence, suffix)
}

/// Recover `(timestamp, sequence)` from a key produced by [`message_key`]
pub fn parse_message_key(key: &str) -> Option<(i64, u32)> {
    let mut parts = key.splitn(3, '-');
    let timestamp = parts.next()?.parse().ok()?;
    let sequence = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((timestamp, sequence))
}
