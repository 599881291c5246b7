//! Authentication and room membership
//!
//! Both checks run in the HTTP layer before a room is resolved, so a rejected
//! caller never reaches a room actor.

pub mod jwt;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use huntroom_shared::{Identity, RoomAddress};

use crate::error::ApiError;

pub use jwt::{JwtError, JwtManager, RoomClaims};

/// Grant that matches every room key
pub const WILDCARD_GRANT: &str = "*";

/// Caller resolved from a token
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub identity: Identity,
    pub grants: Vec<String>,
}

/// Resolves a bearer token to a caller
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedCaller, ApiError>;
}

/// Decides whether a caller may join a room
#[async_trait]
pub trait MembershipCheck: Send + Sync {
    async fn is_member(&self, caller: &AuthenticatedCaller, room: &RoomAddress) -> Result<bool, ApiError>;
}

/// Authenticator backed by HS256 room tokens
#[derive(Clone)]
pub struct JwtAuthenticator {
    jwt: JwtManager,
}

impl JwtAuthenticator {
    pub fn new(jwt: JwtManager) -> Self {
        Self { jwt }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedCaller, ApiError> {
        let claims = self.jwt.validate_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Room token rejected");
            ApiError::InvalidToken
        })?;

        Ok(AuthenticatedCaller {
            identity: claims.identity(),
            grants: claims.grants,
        })
    }
}

/// Membership taken from the grants embedded in the caller's token
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantMembership;

#[async_trait]
impl MembershipCheck for GrantMembership {
    async fn is_member(&self, caller: &AuthenticatedCaller, room: &RoomAddress) -> Result<bool, ApiError> {
        Ok(caller
            .grants
            .iter()
            .any(|grant| grant == WILDCARD_GRANT || grant == room.key.as_str()))
    }
}

/// Token from the `token` query parameter, or else the `Authorization: Bearer` header
///
/// Browsers cannot set headers on a WebSocket handshake, hence the query form.
pub fn extract_token(query_token: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query_token.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
