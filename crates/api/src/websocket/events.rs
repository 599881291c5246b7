//! WebSocket payload types and serialization
//!
//! Defines the JSON frames exchanged with room clients, one object per frame.

use huntroom_shared::{Identity, NotificationEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Client-to-Server
// =============================================================================

/// Chat message sent by a client
#[derive(Debug, Deserialize)]
pub struct ChatInbound {
    pub text: String,
}

// =============================================================================
// Server-to-Client
// =============================================================================

/// One identity inside a presence bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub display_username: Option<String>,
}

impl From<&Identity> for PresenceEntry {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            image: identity.image.clone(),
            display_username: identity.display_username.clone(),
        }
    }
}

/// Scope key -> distinct identities connected under that scope
pub type PresenceSnapshot = BTreeMap<String, Vec<PresenceEntry>>;

/// Notification relayed to clients, stamped with the server time
#[derive(Debug, Serialize)]
pub struct NotificationFrame<'a> {
    #[serde(flatten)]
    pub event: &'a NotificationEvent,
    pub timestamp: i64,
}

/// Best-effort error report sent to a single socket
#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub error: &'static str,
    pub message: String,
}

impl ErrorFrame {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

/// Serialize a payload once so it can be shared by every recipient
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Option<Arc<str>> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            tracing::error!(error = ?e, "Failed to serialize WebSocket payload");
            None
        }
    }
}
