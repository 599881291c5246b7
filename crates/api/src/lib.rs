//! Huntroom API Library
//!
//! Real-time room server: chat, presence and notification rooms over WebSocket.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
