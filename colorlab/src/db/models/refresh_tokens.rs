//! Database models for refresh tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{RefreshTokenId, UserId};

/// Database entity model. Only the SHA-256 hex digest of the raw token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Request for storing a freshly issued refresh token
#[derive(Debug, Clone)]
pub struct RefreshTokenCreateRequest {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
