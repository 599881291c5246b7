//! WebSocket connection handles
//!
//! A connection starts as a [`PendingSocket`] right after the HTTP upgrade and
//! becomes a [`LiveSocket`] once its room has accepted it and written the
//! session attachment.

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Serialized JSON frame, shared between all recipients of a broadcast
pub type Frame = Arc<str>;

/// Channel feeding the connection's writer task
pub type FrameSender = mpsc::UnboundedSender<Frame>;

/// Upgraded connection not yet accepted by a room
#[derive(Debug)]
pub struct PendingSocket {
    pub id: Uuid,
    sender: FrameSender,
}

impl PendingSocket {
    pub fn new(sender: FrameSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Pending socket plus the receiving end of its outbound frames
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub(crate) fn accept(self, attachment: String, opened_at: i64) -> LiveSocket {
        LiveSocket {
            id: self.id,
            sender: self.sender,
            attachment,
            opened_at,
        }
    }
}

/// Accepted connection carrying its serialized session
#[derive(Debug)]
pub struct LiveSocket {
    pub id: Uuid,
    sender: FrameSender,
    attachment: String,
    pub opened_at: i64,
}

impl LiveSocket {
    /// Queue a frame for this connection
    ///
    /// Returns false if the connection's writer has already gone away
    pub fn send(&self, frame: Frame) -> bool {
        self.sender.send(frame).is_ok()
    }

    pub fn attachment(&self) -> &str {
        &self.attachment
    }
}
