//! Presence room: who is connected, grouped by scope
//!
//! Nothing is stored. The snapshot is rebuilt from the socket attachments on
//! every connect and disconnect and pushed to every socket in the room.

use async_trait::async_trait;
use uuid::Uuid;

use super::events::{PresenceEntry, PresenceSnapshot};
use super::room::{RoomBehavior, RoomContext};
use super::session::Session;

#[derive(Debug, Default)]
pub struct PresenceRoom;

impl PresenceRoom {
    fn publish(ctx: &RoomContext) {
        let snapshot = build_snapshot(ctx.key(), &ctx.sessions());
        let report = ctx.broadcast(&snapshot);
        tracing::debug!(
            room = %ctx.address,
            scopes = snapshot.len(),
            recipients = report.recipients,
            "Presence snapshot broadcast"
        );
    }
}

/// Group sessions by scope and keep one entry per identity in each scope
///
/// Sessions without a scope land in a bucket named after the room key. Within a
/// bucket, identities are listed by first connection time.
pub fn build_snapshot(room_key: &str, sessions: &[(Uuid, Session)]) -> PresenceSnapshot {
    let mut ordered: Vec<&(Uuid, Session)> = sessions.iter().collect();
    ordered.sort_by(|(a_id, a), (b_id, b)| {
        a.connected_at
            .cmp(&b.connected_at)
            .then_with(|| a_id.cmp(b_id))
    });

    let mut snapshot = PresenceSnapshot::new();
    for (_, session) in ordered {
        let scope = session
            .scope
            .clone()
            .unwrap_or_else(|| room_key.to_string());
        let bucket = snapshot.entry(scope).or_default();
        if !bucket.iter().any(|entry| entry.id == session.identity.id) {
            bucket.push(PresenceEntry::from(&session.identity));
        }
    }
    snapshot
}

#[async_trait]
impl RoomBehavior for PresenceRoom {
    async fn on_accept(&mut self, ctx: &RoomContext, _socket_id: Uuid, _session: &Session) {
        Self::publish(ctx);
    }

    async fn on_disconnect(&mut self, ctx: &RoomContext, _socket_id: Uuid) {
        Self::publish(ctx);
    }
}
