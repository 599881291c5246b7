//! Common types used across Huntroom

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HuntError;

/// Longest room key accepted by the router
pub const MAX_ROOM_KEY_LEN: usize = 256;

// =============================================================================
// Room addressing
// =============================================================================

/// Opaque key identifying a room instance (puzzle id, workspace id, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomKey(String);

impl RoomKey {
    /// Validate and wrap a raw key
    pub fn new(raw: impl Into<String>) -> Result<Self, HuntError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(HuntError::InvalidRoomKey("room key must not be empty".to_string()));
        }
        if raw.len() > MAX_ROOM_KEY_LEN {
            return Err(HuntError::InvalidRoomKey(format!(
                "room key must be at most {MAX_ROOM_KEY_LEN} bytes"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(HuntError::InvalidRoomKey(
                "room key must not contain control characters".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomKey {
    type Error = HuntError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<RoomKey> for String {
    fn from(key: RoomKey) -> Self {
        key.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room specialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Chat,
    Presence,
    Notification,
}

impl RoomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Chat => "chat",
            RoomKind::Presence => "presence",
            RoomKind::Notification => "notification",
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomKind {
    type Err = HuntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(RoomKind::Chat),
            "presence" => Ok(RoomKind::Presence),
            "notification" | "notifications" => Ok(RoomKind::Notification),
            other => Err(HuntError::UnknownRoomKind(other.to_string())),
        }
    }
}

/// Fully qualified room address: the same key under two kinds is two rooms
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomAddress {
    pub kind: RoomKind,
    pub key: RoomKey,
}

impl RoomAddress {
    pub fn new(kind: RoomKind, key: RoomKey) -> Self {
        Self { kind, key }
    }
}

impl fmt::Display for RoomAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Authenticated caller, as supplied by the authentication collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub display_username: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            image: None,
            display_username: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Name shown next to chat messages: username, then real name, then id
    pub fn display_name(&self) -> &str {
        self.display_username
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.name.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.id)
    }
}

// =============================================================================
// Room payloads
// =============================================================================

/// One chat log entry, exactly as it goes over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub name: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

/// Server-side event relayed verbatim by notification rooms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Generic cache-busting signal
    Invalidate,
    /// A puzzle was solved
    Solved { message: String },
}
