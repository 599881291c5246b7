//! Error types for Huntroom

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HuntError {
    #[error("Invalid room key: {0}")]
    InvalidRoomKey(String),

    #[error("Unknown room kind: {0}")]
    UnknownRoomKind(String),
}
