//! Notification room: relays server-side events, nothing else

use async_trait::async_trait;
use huntroom_shared::NotificationEvent;
use uuid::Uuid;

use super::events::NotificationFrame;
use super::room::{RoomBehavior, RoomContext};
use super::session::Session;

#[derive(Debug, Default)]
pub struct NotificationRoom;

#[async_trait]
impl RoomBehavior for NotificationRoom {
    async fn on_accept(&mut self, _ctx: &RoomContext, _socket_id: Uuid, _session: &Session) {}

    async fn on_broadcast(&mut self, ctx: &RoomContext, event: &NotificationEvent) {
        let frame = NotificationFrame {
            event,
            timestamp: ctx.now_ms(),
        };
        let report = ctx.broadcast(&frame);
        tracing::info!(
            room = %ctx.address,
            recipients = report.recipients,
            failed = report.failed,
            "Notification relayed"
        );
    }
}
