//! Chat room: durable ordered log with a silence expiry
//!
//! New sockets receive the whole log as one array frame. Each inbound message
//! is broadcast to the room first and persisted second, so a storage failure
//! never blocks live delivery. Every message re-arms the room's single expiry
//! alarm; when it fires the whole log is deleted.
//!
//! A deadline that has passed is honoured on the next command the room sees,
//! whether or not the alarm sweeper has reached it yet.

use async_trait::async_trait;
use huntroom_shared::ChatMessage;
use uuid::Uuid;

use super::events::{ChatInbound, ErrorFrame};
use super::room::{RoomBehavior, RoomContext};
use super::session::Session;
use crate::storage::{message_key, parse_message_key};

/// Largest per-millisecond sequence that keeps keys fixed-width
const MAX_SEQUENCE: u32 = 999_999;

/// Outcome of checking the room's expiry deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    NotDue,
    Expired,
    /// Deadline could not be checked or the delete failed; the alarm stays armed
    Failed,
}

#[derive(Debug, Default)]
pub struct ChatRoom {
    /// `(timestamp, sequence)` of the last key written by this room
    last: Option<(i64, u32)>,
}

impl ChatRoom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next key, never ordered before the previous one even if the clock stalls
    /// or steps back
    fn next_key(&mut self, now_ms: i64) -> (i64, String) {
        let (timestamp, sequence) = match self.last {
            Some((last_ts, last_seq)) if now_ms <= last_ts && last_seq < MAX_SEQUENCE => {
                (last_ts, last_seq + 1)
            }
            Some((last_ts, _)) if now_ms <= last_ts => (last_ts + 1, 0),
            _ => (now_ms, 0),
        };
        self.last = Some((timestamp, sequence));
        (timestamp, message_key(timestamp, sequence, rand::random::<u32>()))
    }

    async fn arm_alarm(&self, ctx: &RoomContext, from_ms: i64) {
        let retention = i64::try_from(ctx.settings.chat_retention.as_millis()).unwrap_or(i64::MAX);
        let fire_at = from_ms.saturating_add(retention);
        if let Err(e) = ctx.store().set_alarm(ctx.key(), fire_at).await {
            tracing::error!(room = %ctx.address, error = %e, "Failed to arm chat expiry alarm");
        }
    }

    /// Delete the log if its deadline is at or before `now_ms`
    async fn expire_if_due(&self, ctx: &RoomContext, now_ms: i64) -> Expiry {
        match ctx.store().alarm(ctx.key()).await {
            Ok(Some(fire_at)) if fire_at <= now_ms => {}
            Ok(_) => return Expiry::NotDue,
            Err(e) => {
                tracing::error!(room = %ctx.address, error = %e, "Failed to read chat alarm");
                return Expiry::Failed;
            }
        }

        match ctx.store().delete_log(ctx.key()).await {
            Ok(deleted) => {
                tracing::info!(room = %ctx.address, deleted, "Chat log expired");
                if let Err(e) = ctx.store().clear_alarm(ctx.key()).await {
                    tracing::error!(room = %ctx.address, error = %e, "Failed to clear chat alarm");
                }
                Expiry::Expired
            }
            Err(e) => {
                tracing::error!(room = %ctx.address, error = %e, "Failed to expire chat log");
                Expiry::Failed
            }
        }
    }
}

#[async_trait]
impl RoomBehavior for ChatRoom {
    async fn on_start(&mut self, ctx: &RoomContext) {
        match ctx.store().last_key(ctx.key()).await {
            Ok(Some(key)) => {
                self.last = parse_message_key(&key);
                if self.last.is_none() {
                    tracing::warn!(room = %ctx.address, key = %key, "Unrecognized stored message key");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(room = %ctx.address, error = %e, "Failed to read chat log position");
            }
        }
    }

    async fn on_accept(&mut self, ctx: &RoomContext, socket_id: Uuid, _session: &Session) {
        let now = ctx.now_ms();
        if self.expire_if_due(ctx, now).await == Expiry::Failed {
            // Never replay a log that may be past its deadline
            ctx.send_to(
                &socket_id,
                &ErrorFrame::new("history_unavailable", "Chat history could not be loaded"),
            );
            return;
        }

        match ctx.store().load_log(ctx.key()).await {
            Ok(log) => {
                tracing::debug!(room = %ctx.address, messages = log.len(), "Replaying chat log");
                ctx.send_to(&socket_id, &log);
            }
            Err(e) => {
                tracing::error!(room = %ctx.address, error = %e, "Failed to load chat log");
                ctx.send_to(
                    &socket_id,
                    &ErrorFrame::new("history_unavailable", "Chat history could not be loaded"),
                );
            }
        }

        self.arm_alarm(ctx, now).await;
    }

    async fn on_message(&mut self, ctx: &RoomContext, socket_id: Uuid, payload: &str) {
        let Some(session) = ctx.session(&socket_id) else {
            return;
        };

        let inbound: ChatInbound = match serde_json::from_str(payload) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(
                    room = %ctx.address,
                    socket_id = %socket_id,
                    error = %e,
                    "Dropping malformed chat payload"
                );
                return;
            }
        };

        let now = ctx.now_ms();
        let expiry = self.expire_if_due(ctx, now).await;

        let (timestamp, key) = self.next_key(now);
        let message = ChatMessage {
            text: inbound.text,
            name: session.identity.display_name().to_string(),
            timestamp,
        };

        let report = ctx.broadcast(&message);
        tracing::debug!(
            room = %ctx.address,
            key = %key,
            recipients = report.recipients,
            "Chat message broadcast"
        );

        if let Err(e) = ctx.store().append(ctx.key(), &key, &message).await {
            tracing::error!(
                room = %ctx.address,
                key = %key,
                error = %e,
                "Failed to persist chat message"
            );
            ctx.send_to(
                &socket_id,
                &ErrorFrame::new("persist_failed", "Message was delivered but not saved"),
            );
        }

        // A due deadline that could not be honoured keeps its alarm for the sweeper
        if expiry != Expiry::Failed {
            self.arm_alarm(ctx, timestamp).await;
        }
    }

    async fn on_alarm(&mut self, ctx: &RoomContext) {
        if self.expire_if_due(ctx, ctx.now_ms()).await == Expiry::NotDue {
            tracing::debug!(room = %ctx.address, "Alarm is not due, skipping");
        }
    }
}
