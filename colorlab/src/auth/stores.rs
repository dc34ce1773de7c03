//! Persistence collaborators of the auth session manager.
//!
//! [`CredentialStore`] and [`RefreshTokenStore`] are injected into
//! [`crate::auth::service::AuthService`] as trait objects. The Postgres implementations here
//! wrap the [`Users`] and [`RefreshTokens`] repositories; in-memory implementations for tests
//! live in [`crate::test_utils`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::{
    auth::tokens::hash_token,
    db::{
        errors::DbError,
        handlers::{RefreshTokens, Repository, Users},
        models::{
            refresh_tokens::{RefreshToken, RefreshTokenCreateRequest},
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
    },
    errors::{Error, Result},
    types::UserId,
};

/// User records with their password hashes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Insert a user. A duplicate email surfaces as a unique violation.
    async fn create(&self, request: UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Change email and/or name. `None` leaves a field untouched.
    async fn update_profile(&self, id: UserId, email: Option<String>, name: Option<String>) -> Result<UserDBResponse>;

    async fn update_password(&self, id: UserId, password_hash: String) -> Result<UserDBResponse>;
}

/// Result of consuming a refresh token. The row is gone in every case.
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    /// The token was stored and still valid
    Consumed(RefreshToken),
    /// The token was stored but its expiry had passed
    Expired,
    /// No row matched `(user_id, hash(token))`
    NotFound,
}

impl ConsumeOutcome {
    /// Classify a row removed by an atomic take
    pub fn from_taken(taken: Option<RefreshToken>, now: DateTime<Utc>) -> Self {
        match taken {
            None => ConsumeOutcome::NotFound,
            Some(token) if token.is_expired_at(now) => ConsumeOutcome::Expired,
            Some(token) => ConsumeOutcome::Consumed(token),
        }
    }
}

/// Hashed refresh tokens keyed by user, for single-use rotation and revocation.
///
/// Implementations hash raw tokens with [`hash_token`] and never keep the raw value.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn store(&self, user_id: UserId, raw_token: &str, expires_at: DateTime<Utc>) -> Result<RefreshToken>;

    /// Remove the matching row in one atomic step and report what was found.
    async fn consume(&self, user_id: UserId, raw_token: &str) -> Result<ConsumeOutcome>;

    /// Remove one session's token, returning whether anything was deleted
    async fn revoke_one(&self, user_id: UserId, raw_token: &str) -> Result<bool>;

    /// Remove every token of the user. Idempotent.
    async fn revoke_all(&self, user_id: UserId) -> Result<u64>;

    /// Remove rows whose expiry has passed
    async fn purge_expired(&self) -> Result<u64>;
}

/// [`CredentialStore`] over the `users` table
#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn update(&self, id: UserId, request: UserUpdateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        match Users::new(&mut conn).update(id, &request).await {
            Ok(user) => Ok(user),
            Err(DbError::NotFound) => Err(Error::not_found("Usuario", id)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    #[instrument(skip_all)]
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(Users::new(&mut conn).get_user_by_email(email).await?)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(Users::new(&mut conn).get_by_id(id).await?)
    }

    #[instrument(skip_all)]
    async fn create(&self, request: UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(Users::new(&mut conn).create(&request).await?)
    }

    #[instrument(skip(self, email, name))]
    async fn update_profile(&self, id: UserId, email: Option<String>, name: Option<String>) -> Result<UserDBResponse> {
        self.update(
            id,
            UserUpdateDBRequest {
                email,
                name,
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password(&self, id: UserId, password_hash: String) -> Result<UserDBResponse> {
        self.update(
            id,
            UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await
    }
}

/// [`RefreshTokenStore`] over the `refresh_tokens` table
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    db: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    #[instrument(skip(self, raw_token))]
    async fn store(&self, user_id: UserId, raw_token: &str, expires_at: DateTime<Utc>) -> Result<RefreshToken> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let request = RefreshTokenCreateRequest {
            user_id,
            token_hash: hash_token(raw_token),
            expires_at,
        };
        Ok(RefreshTokens::new(&mut conn).create(&request).await?)
    }

    #[instrument(skip(self, raw_token))]
    async fn consume(&self, user_id: UserId, raw_token: &str) -> Result<ConsumeOutcome> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let taken = RefreshTokens::new(&mut conn).take(user_id, &hash_token(raw_token)).await?;
        Ok(ConsumeOutcome::from_taken(taken, Utc::now()))
    }

    #[instrument(skip(self, raw_token))]
    async fn revoke_one(&self, user_id: UserId, raw_token: &str) -> Result<bool> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(RefreshTokens::new(&mut conn).delete_one(user_id, &hash_token(raw_token)).await?)
    }

    #[instrument(skip(self))]
    async fn revoke_all(&self, user_id: UserId) -> Result<u64> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(RefreshTokens::new(&mut conn).delete_all_for_user(user_id).await?)
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> Result<u64> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(RefreshTokens::new(&mut conn).purge_expired().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_user;
    use chrono::Duration;

    fn token(expires_at: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id: 1,
            user_id: 9,
            token_hash: hash_token("raw"),
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_consume_outcome_classification() {
        let now = Utc::now();
        assert!(matches!(ConsumeOutcome::from_taken(None, now), ConsumeOutcome::NotFound));
        assert!(matches!(
            ConsumeOutcome::from_taken(Some(token(now - Duration::seconds(1))), now),
            ConsumeOutcome::Expired
        ));
        assert!(matches!(
            ConsumeOutcome::from_taken(Some(token(now + Duration::days(7))), now),
            ConsumeOutcome::Consumed(t) if t.user_id == 9
        ));
    }

    #[sqlx::test]
    async fn test_pg_store_rotation_outcomes(pool: PgPool) {
        let user = seed_user(&pool, "ana@example.com").await;
        let store = PgRefreshTokenStore::new(pool.clone());

        store.store(user.id, "live", Utc::now() + Duration::days(7)).await.unwrap();
        store.store(user.id, "stale", Utc::now() - Duration::seconds(1)).await.unwrap();

        assert!(matches!(store.consume(user.id, "live").await.unwrap(), ConsumeOutcome::Consumed(t) if t.user_id == user.id));
        assert!(matches!(store.consume(user.id, "live").await.unwrap(), ConsumeOutcome::NotFound));

        assert!(matches!(store.consume(user.id, "stale").await.unwrap(), ConsumeOutcome::Expired));
        assert!(matches!(store.consume(user.id, "stale").await.unwrap(), ConsumeOutcome::NotFound));
    }

    #[sqlx::test]
    async fn test_pg_store_concurrent_consume(pool: PgPool) {
        let user = seed_user(&pool, "ana@example.com").await;
        let store = PgRefreshTokenStore::new(pool.clone());
        store.store(user.id, "shared", Utc::now() + Duration::days(7)).await.unwrap();

        let (a, b) = tokio::join!(store.consume(user.id, "shared"), store.consume(user.id, "shared"));
        let consumed = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|outcome| matches!(outcome, ConsumeOutcome::Consumed(_)))
            .count();
        assert_eq!(consumed, 1);
        assert_eq!(store.revoke_all(user.id).await.unwrap(), 0);
    }
}
