//! Shared application state

use huntroom_shared::Clock;
use std::sync::Arc;

use crate::auth::{Authenticator, GrantMembership, JwtAuthenticator, JwtManager, MembershipCheck};
use crate::config::Config;
use crate::storage::ChatStore;
use crate::websocket::{RoomRegistry, RoomSettings};

/// Lifetime of tokens minted by this service
pub const ROOM_TOKEN_EXPIRY_HOURS: i64 = 24;

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: RoomRegistry,
    pub authenticator: Arc<dyn Authenticator>,
    pub membership: Arc<dyn MembershipCheck>,
}

impl AppState {
    /// State with JWT authentication and grant-based membership
    pub fn new(config: Config, store: Arc<dyn ChatStore>, clock: Arc<dyn Clock>) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, ROOM_TOKEN_EXPIRY_HOURS);
        Self::with_collaborators(
            config,
            store,
            clock,
            Arc::new(JwtAuthenticator::new(jwt)),
            Arc::new(GrantMembership),
        )
    }

    pub fn with_collaborators(
        config: Config,
        store: Arc<dyn ChatStore>,
        clock: Arc<dyn Clock>,
        authenticator: Arc<dyn Authenticator>,
        membership: Arc<dyn MembershipCheck>,
    ) -> Self {
        let settings = RoomSettings {
            chat_retention: config.chat_retention,
            idle_timeout: config.room_idle_timeout,
        };

        Self {
            config: Arc::new(config),
            rooms: RoomRegistry::new(store, clock, settings),
            authenticator,
            membership,
        }
    }
}
