//! Per-connection session and its socket attachment
//!
//! A [`Session`] is never kept in actor memory. It is serialized into the
//! attachment slot of the socket at accept time and decoded again whenever the
//! room needs it, so a room actor that was torn down and recreated sees exactly
//! the same sessions as before.

use huntroom_shared::{Identity, RoomKind};
use serde::{Deserialize, Serialize};

/// State attached to one accepted socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    /// Sub-resource the user is viewing (presence rooms only)
    pub scope: Option<String>,
    /// Unix epoch milliseconds
    pub connected_at: i64,
}

/// Serialized form stored on the socket, tagged by room kind
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Attachment {
    Chat {
        identity: Identity,
        connected_at: i64,
    },
    Presence {
        identity: Identity,
        #[serde(default)]
        scope: Option<String>,
        connected_at: i64,
    },
    Notification {
        identity: Identity,
        connected_at: i64,
    },
}

impl Attachment {
    fn kind(&self) -> RoomKind {
        match self {
            Attachment::Chat { .. } => RoomKind::Chat,
            Attachment::Presence { .. } => RoomKind::Presence,
            Attachment::Notification { .. } => RoomKind::Notification,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Malformed session attachment: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Attachment belongs to a {found} room, expected {expected}")]
    WrongKind { expected: RoomKind, found: RoomKind },
    #[error("Session identity is missing")]
    MissingIdentity,
}

impl Session {
    pub fn new(identity: Identity, scope: Option<String>, connected_at: i64) -> Self {
        Self {
            identity,
            scope: scope.filter(|s| !s.is_empty()),
            connected_at,
        }
    }

    /// Serialize for the socket attachment slot of a `kind` room
    pub fn encode_attachment(&self, kind: RoomKind) -> Result<String, SessionError> {
        if self.identity.id.is_empty() {
            return Err(SessionError::MissingIdentity);
        }

        let identity = self.identity.clone();
        let connected_at = self.connected_at;
        let attachment = match kind {
            RoomKind::Chat => Attachment::Chat {
                identity,
                connected_at,
            },
            RoomKind::Presence => Attachment::Presence {
                identity,
                scope: self.scope.clone(),
                connected_at,
            },
            RoomKind::Notification => Attachment::Notification {
                identity,
                connected_at,
            },
        };

        Ok(serde_json::to_string(&attachment)?)
    }

    /// Rebuild a session from an attachment, rejecting anything not written for `kind`
    pub fn decode_attachment(kind: RoomKind, raw: &str) -> Result<Self, SessionError> {
        let attachment: Attachment = serde_json::from_str(raw)?;
        let found = attachment.kind();
        if found != kind {
            return Err(SessionError::WrongKind {
                expected: kind,
                found,
            });
        }

        let (identity, scope, connected_at) = match attachment {
            Attachment::Chat {
                identity,
                connected_at,
            }
            | Attachment::Notification {
                identity,
                connected_at,
            } => (identity, None, connected_at),
            Attachment::Presence {
                identity,
                scope,
                connected_at,
            } => (identity, scope, connected_at),
        };

        if identity.id.is_empty() {
            return Err(SessionError::MissingIdentity);
        }

        Ok(Self {
            identity,
            scope,
            connected_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> Identity {
        Identity::new("u1").with_name("Ada").with_email("ada@example.com")
    }

    #[test]
    fn test_presence_attachment_round_trip() {
        let session = Session::new(ada(), Some("puzzle-7".to_string()), 1_000);
        let raw = session.encode_attachment(RoomKind::Presence).unwrap();
        let restored = Session::decode_attachment(RoomKind::Presence, &raw).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_chat_attachment_drops_scope() {
        let session = Session::new(ada(), Some("ignored".to_string()), 1_000);
        let raw = session.encode_attachment(RoomKind::Chat).unwrap();
        let restored = Session::decode_attachment(RoomKind::Chat, &raw).unwrap();
        assert_eq!(restored.identity, session.identity);
        assert_eq!(restored.scope, None);
    }

    #[test]
    fn test_empty_scope_is_no_scope() {
        let session = Session::new(ada(), Some(String::new()), 1_000);
        assert_eq!(session.scope, None);
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let raw = Session::new(ada(), None, 1)
            .encode_attachment(RoomKind::Chat)
            .unwrap();
        assert!(matches!(
            Session::decode_attachment(RoomKind::Presence, &raw),
            Err(SessionError::WrongKind {
                expected: RoomKind::Presence,
                found: RoomKind::Chat
            })
        ));
    }

    #[test]
    fn test_malformed_attachments_rejected() {
        assert!(matches!(
            Session::decode_attachment(RoomKind::Chat, "{not json"),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(
            Session::decode_attachment(RoomKind::Chat, r#"{"kind":"chat","displayName":"x"}"#),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(
            Session::decode_attachment(
                RoomKind::Chat,
                r#"{"kind":"chat","identity":{"id":""},"connected_at":1}"#
            ),
            Err(SessionError::MissingIdentity)
        ));
    }

    #[test]
    fn test_missing_identity_not_encoded() {
        let session = Session::new(Identity::new(""), None, 1);
        assert!(matches!(
            session.encode_attachment(RoomKind::Notification),
            Err(SessionError::MissingIdentity)
        ));
    }
}
