//! Session lifecycle: register, login, refresh rotation and logout.
//!
//! [`AuthService`] owns no state of its own. Users live behind a [`CredentialStore`] and
//! outstanding refresh tokens behind a [`RefreshTokenStore`], both injected at construction so
//! tests can run against in-memory stores.
//!
//! Every refresh token is single use. `refresh` consumes the presented token atomically and
//! issues a new pair, so replaying an old refresh token always fails.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::{
    api::models::{
        auth::{LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, TokenPairResponse},
        users::{CurrentUser, UserCreate, UserResponse, UserUpdate},
        validation,
    },
    auth::{
        password::{self, Argon2Params},
        stores::{ConsumeOutcome, CredentialStore, RefreshTokenStore},
        tokens::{TokenCodec, TokenPayload},
    },
    config::{Config, PasswordConfig},
    db::{errors::DbError, models::users::UserCreateDBRequest, models::users::UserDBResponse},
    errors::{Error, Result},
    types::{ROLE_ADMIN, RoleId, UserId},
};

const DUPLICATE_EMAIL_MESSAGE: &str = "El usuario ya existe";

#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    codec: TokenCodec,
    default_role: RoleId,
    password_config: PasswordConfig,
}

impl AuthService {
    pub fn new(config: &Config, credentials: Arc<dyn CredentialStore>, refresh_tokens: Arc<dyn RefreshTokenStore>) -> Result<Self> {
        Ok(Self {
            credentials,
            refresh_tokens,
            codec: TokenCodec::from_config(config)?,
            default_role: config.auth.default_role,
            password_config: config.auth.password.clone(),
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    fn argon2_params(&self) -> Argon2Params {
        Argon2Params::from(&self.password_config)
    }

    /// Decode a Bearer access token into the calling user.
    pub fn authenticate(&self, access_token: &str) -> Result<CurrentUser> {
        let claims = self.codec.verify_access(access_token)?;
        Ok(CurrentUser {
            id: claims.sub,
            role: claims.role,
        })
    }

    #[instrument(skip_all)]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse> {
        let request = request.validate()?;
        self.create_with_role(request.email, request.password, request.name, self.default_role)
            .await
    }

    /// Admin-only user creation with an explicit role tier.
    #[instrument(skip_all)]
    pub async fn create_user(&self, caller: &CurrentUser, request: UserCreate) -> Result<UserResponse> {
        require_admin(caller, "crear usuarios")?;
        let request = request.validate()?;
        let role = request.role.unwrap_or(self.default_role);
        self.create_with_role(request.email, request.password, request.name, role).await
    }

    async fn create_with_role(&self, email: String, password: String, name: Option<String>, role_id: RoleId) -> Result<UserResponse> {
        password::validate_password(&password, &self.password_config)?;

        if self.credentials.find_by_email(&email).await?.is_some() {
            return Err(Error::Conflict {
                message: DUPLICATE_EMAIL_MESSAGE.to_string(),
            });
        }

        let password_hash = password::hash_password_blocking(password, self.argon2_params()).await?;
        let user = self
            .credentials
            .create(UserCreateDBRequest {
                email,
                password_hash,
                name,
                role_id,
            })
            .await
            .map_err(duplicate_email_as_conflict)?;

        info!(user_id = user.id, role_id, "User registered");
        Ok(user.into())
    }

    /// Check credentials and open a new session.
    ///
    /// An unknown email and a wrong password fail identically. For unknown emails a throwaway
    /// hash is computed so both paths cost roughly the same.
    #[instrument(skip_all)]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let email = validation::email("email", &request.email)?;

        let Some(user) = self.credentials.find_by_email(&email).await? else {
            password::hash_password_blocking(request.password, self.argon2_params()).await?;
            debug!("Login for unknown email");
            return Err(Error::InvalidCredentials);
        };

        if !password::verify_password_blocking(request.password, user.password_hash.clone()).await? {
            debug!(user_id = user.id, "Login with wrong password");
            return Err(Error::InvalidCredentials);
        }

        let tokens = self.issue_pair(&user).await?;
        info!(user_id = user.id, "User logged in");

        Ok(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: user.into(),
        })
    }

    /// Exchange a stored refresh token for a new pair. The presented token is gone afterwards.
    #[instrument(skip_all, fields(user_id = request.user_id))]
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPairResponse> {
        match self.refresh_tokens.consume(request.user_id, &request.refresh_token).await? {
            ConsumeOutcome::NotFound => Err(Error::InvalidRefreshToken { expired: false }),
            ConsumeOutcome::Expired => Err(Error::InvalidRefreshToken { expired: true }),
            ConsumeOutcome::Consumed(_) => {
                let user = self
                    .credentials
                    .find_by_id(request.user_id)
                    .await?
                    .ok_or_else(|| Error::not_found("Usuario", request.user_id))?;
                self.issue_pair(&user).await
            }
        }
    }

    /// Revoke one session. The token must carry a valid signature and belong to `user_id`.
    #[instrument(skip_all, fields(user_id = request.user_id))]
    pub async fn logout(&self, request: RefreshRequest) -> Result<()> {
        let claims = self.codec.verify_refresh(&request.refresh_token).map_err(|e| match e {
            Error::Unauthenticated { .. } => Error::InvalidRefreshToken { expired: false },
            other => other,
        })?;

        if claims.sub != request.user_id {
            return Err(Error::TokenMismatch {
                user_id: request.user_id,
            });
        }

        if !self.refresh_tokens.revoke_one(request.user_id, &request.refresh_token).await? {
            return Err(Error::TokenNotFound);
        }

        info!("Session closed");
        Ok(())
    }

    /// Revoke every session of the user. Succeeds even when none are open.
    #[instrument(skip(self))]
    pub async fn logout_all(&self, user_id: UserId) -> Result<u64> {
        let revoked = self.refresh_tokens.revoke_all(user_id).await?;
        info!(revoked, "All sessions closed");
        Ok(revoked)
    }

    /// Drop stored refresh tokens past their expiry.
    #[instrument(skip(self))]
    pub async fn purge_expired_tokens(&self) -> Result<u64> {
        let purged = self.refresh_tokens.purge_expired().await?;
        if purged > 0 {
            info!(purged, "Purged expired refresh tokens");
        }
        Ok(purged)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: UserId) -> Result<UserResponse> {
        self.credentials
            .find_by_id(id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| Error::not_found("Usuario", id))
    }

    #[instrument(skip_all)]
    pub async fn get_user_by_email(&self, email: &str) -> Result<UserResponse> {
        let email = validation::email("email", email)?;
        self.credentials
            .find_by_email(&email)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| Error::not_found("Usuario", &email))
    }

    /// Update profile fields and optionally the password.
    ///
    /// Users may only update themselves; admins may update anyone.
    #[instrument(skip_all, fields(caller = caller.id))]
    pub async fn update_user(&self, caller: &CurrentUser, request: UserUpdate) -> Result<UserResponse> {
        let request = request.validate()?;
        if caller.id != request.id && !caller.is_admin() {
            return Err(Error::Forbidden {
                action: "modificar otros usuarios".to_string(),
            });
        }

        let existing = self
            .credentials
            .find_by_id(request.id)
            .await?
            .ok_or_else(|| Error::not_found("Usuario", request.id))?;

        if existing.email != request.email
            && let Some(other) = self.credentials.find_by_email(&request.email).await?
            && other.id != existing.id
        {
            return Err(Error::Conflict {
                message: DUPLICATE_EMAIL_MESSAGE.to_string(),
            });
        }

        let mut user = self
            .credentials
            .update_profile(request.id, Some(request.email), request.name)
            .await
            .map_err(duplicate_email_as_conflict)?;

        if let Some(new_password) = request.password {
            password::validate_password(&new_password, &self.password_config)?;
            let password_hash = password::hash_password_blocking(new_password, self.argon2_params()).await?;
            user = self.credentials.update_password(request.id, password_hash).await?;
        }

        info!(user_id = user.id, "User updated");
        Ok(user.into())
    }

    /// Create the initial admin if no user holds `email` yet. Returns whether a user was created.
    #[instrument(skip(self, password, name))]
    pub async fn seed_admin(&self, email: &str, password: &str, name: &str) -> Result<bool> {
        let email = validation::email("admin_email", email)?;
        if self.credentials.find_by_email(&email).await?.is_some() {
            debug!("Admin user already present");
            return Ok(false);
        }

        let password_hash = password::hash_password_blocking(password.to_string(), self.argon2_params()).await?;
        let user = self
            .credentials
            .create(UserCreateDBRequest {
                email,
                password_hash,
                name: Some(name.to_string()),
                role_id: ROLE_ADMIN,
            })
            .await?;

        info!(user_id = user.id, "Seeded admin user");
        Ok(true)
    }

    async fn issue_pair(&self, user: &UserDBResponse) -> Result<TokenPairResponse> {
        let payload = TokenPayload {
            sub: user.id,
            role: Some(user.role_id),
        };
        let access = self.codec.sign_access(payload)?;
        let refresh = self.codec.sign_refresh(payload)?;

        // The stored row expires with the refresh token itself, not the access token.
        self.refresh_tokens.store(user.id, &refresh.token, refresh.expires_at).await?;

        Ok(TokenPairResponse {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }
}

/// Fail with `Forbidden` unless the caller holds the admin role.
pub fn require_admin(caller: &CurrentUser, action: &str) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden {
            action: action.to_string(),
        })
    }
}

fn duplicate_email_as_conflict(err: Error) -> Error {
    match err {
        Error::Database(db_err @ DbError::UniqueViolation { .. }) if db_err.is_duplicate_email() => Error::Conflict {
            message: DUPLICATE_EMAIL_MESSAGE.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::tokens::TokenKind,
        test_utils::{InMemoryCredentialStore, InMemoryRefreshTokenStore, create_test_auth_service, create_test_config},
        types::ROLE_USER,
    };
    use chrono::{Duration, Utc};

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "password123".to_string(),
            name: Some("Ana".to_string()),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn registered(service: &AuthService, email: &str) -> (UserResponse, LoginResponse) {
        let user = service.register(register_request(email)).await.unwrap();
        let login = service.login(login_request(email, "password123")).await.unwrap();
        (user, login)
    }

    #[test_log::test(tokio::test)]
    async fn test_register_then_login_issues_tokens_for_user() {
        let (service, _, tokens) = create_test_auth_service();

        let (user, login) = registered(&service, "Ana@Example.com").await;
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.role, ROLE_USER);
        assert_eq!(login.user.id, user.id);

        let access = service.codec().verify_access(&login.access_token).unwrap();
        assert_eq!(access.sub, user.id);
        assert_eq!(access.role, Some(ROLE_USER));
        let refresh = service.codec().verify_refresh(&login.refresh_token).unwrap();
        assert_eq!(refresh.sub, user.id);
        assert_eq!(refresh.kind, TokenKind::Refresh);

        assert_eq!(tokens.count_for(user.id), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_stored_expiry_follows_refresh_token() {
        let (service, _, tokens) = create_test_auth_service();
        let (user, login) = registered(&service, "ana@example.com").await;

        let claims = service.codec().verify_refresh(&login.refresh_token).unwrap();
        let stored = tokens.tokens_for(user.id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].expires_at, claims.expires_at());
        assert!(stored[0].expires_at > Utc::now() + Duration::days(6));
    }

    #[test_log::test(tokio::test)]
    async fn test_purge_drops_only_expired_tokens() {
        let (service, _, tokens) = create_test_auth_service();
        let (user, _) = registered(&service, "ana@example.com").await;
        tokens
            .store(user.id, "stale-token", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(tokens.count_for(user.id), 2);

        assert_eq!(service.purge_expired_tokens().await.unwrap(), 1);
        assert_eq!(tokens.count_for(user.id), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_register_duplicate_email_conflicts() {
        let (service, _, _) = create_test_auth_service();
        service.register(register_request("ana@example.com")).await.unwrap();

        let err = service.register(register_request("ANA@example.com")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(err.user_message(), "El usuario ya existe");
    }

    #[test_log::test(tokio::test)]
    async fn test_register_rejects_short_password() {
        let (service, credentials, _) = create_test_auth_service();
        let request = RegisterRequest {
            password: "short".to_string(),
            ..register_request("ana@example.com")
        };

        assert!(matches!(service.register(request).await, Err(Error::Validation { .. })));
        assert!(credentials.find_by_email("ana@example.com").await.unwrap().is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_login_failures_are_indistinguishable() {
        let (service, _, _) = create_test_auth_service();
        service.register(register_request("ana@example.com")).await.unwrap();

        let wrong_password = service.login(login_request("ana@example.com", "nope-nope")).await.unwrap_err();
        let unknown_email = service.login(login_request("nadie@example.com", "password123")).await.unwrap_err();

        assert_eq!(wrong_password.status_code(), unknown_email.status_code());
        assert_eq!(wrong_password.user_message(), unknown_email.user_message());
        assert_eq!(wrong_password.technical_message(), unknown_email.technical_message());
        assert!(matches!(wrong_password, Error::InvalidCredentials));
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_rotates_and_is_single_use() {
        let (service, _, tokens) = create_test_auth_service();
        let (user, login) = registered(&service, "ana@example.com").await;

        let request = RefreshRequest {
            refresh_token: login.refresh_token.clone(),
            user_id: user.id,
        };
        let rotated = service.refresh(request.clone()).await.unwrap();
        assert_ne!(rotated.refresh_token, login.refresh_token);
        assert_eq!(service.codec().verify_access(&rotated.access_token).unwrap().sub, user.id);

        let replay = service.refresh(request).await.unwrap_err();
        assert!(matches!(replay, Error::InvalidRefreshToken { expired: false }));

        // Only the rotated token remains
        assert_eq!(tokens.count_for(user.id), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_with_other_users_id_fails() {
        let (service, _, _) = create_test_auth_service();
        let (user, login) = registered(&service, "ana@example.com").await;

        let err = service
            .refresh(RefreshRequest {
                refresh_token: login.refresh_token,
                user_id: user.id + 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRefreshToken { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn test_expired_refresh_token_is_deleted_on_consume() {
        let (service, _, tokens) = create_test_auth_service();
        let (user, _) = registered(&service, "ana@example.com").await;

        tokens
            .store(user.id, "stale-token", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();
        let request = RefreshRequest {
            refresh_token: "stale-token".to_string(),
            user_id: user.id,
        };

        let first = service.refresh(request.clone()).await.unwrap_err();
        assert!(matches!(first, Error::InvalidRefreshToken { expired: true }));

        let second = service.refresh(request).await.unwrap_err();
        assert!(matches!(second, Error::InvalidRefreshToken { expired: false }));
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_for_deleted_user_fails() {
        let (service, credentials, _) = create_test_auth_service();
        let (user, login) = registered(&service, "ana@example.com").await;
        credentials.remove(user.id);

        let err = service
            .refresh(RefreshRequest {
                refresh_token: login.refresh_token,
                user_id: user.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_all_invalidates_every_refresh_token() {
        let (service, _, tokens) = create_test_auth_service();
        let (user, first) = registered(&service, "ana@example.com").await;
        let second = service.login(login_request("ana@example.com", "password123")).await.unwrap();

        assert_eq!(service.logout_all(user.id).await.unwrap(), 2);
        assert_eq!(tokens.count_for(user.id), 0);

        for token in [first.refresh_token, second.refresh_token] {
            let err = service
                .refresh(RefreshRequest {
                    refresh_token: token,
                    user_id: user.id,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidRefreshToken { .. }));
        }

        // Idempotent
        assert_eq!(service.logout_all(user.id).await.unwrap(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_revokes_one_session() {
        let (service, _, tokens) = create_test_auth_service();
        let (user, first) = registered(&service, "ana@example.com").await;
        let second = service.login(login_request("ana@example.com", "password123")).await.unwrap();

        let request = RefreshRequest {
            refresh_token: first.refresh_token,
            user_id: user.id,
        };
        service.logout(request.clone()).await.unwrap();
        assert_eq!(tokens.count_for(user.id), 1);

        let again = service.logout(request).await.unwrap_err();
        assert!(matches!(again, Error::TokenNotFound));

        // The other session still refreshes
        service
            .refresh(RefreshRequest {
                refresh_token: second.refresh_token,
                user_id: user.id,
            })
            .await
            .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_checks_subject_and_signature() {
        let (service, _, tokens) = create_test_auth_service();
        let (user, login) = registered(&service, "ana@example.com").await;

        let mismatch = service
            .logout(RefreshRequest {
                refresh_token: login.refresh_token.clone(),
                user_id: user.id + 100,
            })
            .await
            .unwrap_err();
        assert!(matches!(mismatch, Error::TokenMismatch { .. }));

        let garbage = service
            .logout(RefreshRequest {
                refresh_token: "not.a.jwt".to_string(),
                user_id: user.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(garbage, Error::InvalidRefreshToken { .. }));

        // An access token is not a refresh token
        let wrong_kind = service
            .logout(RefreshRequest {
                refresh_token: login.access_token,
                user_id: user.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(wrong_kind, Error::InvalidRefreshToken { .. }));

        assert_eq!(tokens.count_for(user.id), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_update_user_permissions() {
        let (service, _, _) = create_test_auth_service();
        let (ana, _) = registered(&service, "ana@example.com").await;
        let (luis, _) = registered(&service, "luis@example.com").await;

        let as_ana = CurrentUser {
            id: ana.id,
            role: Some(ROLE_USER),
        };
        let update_luis = UserUpdate {
            id: luis.id,
            email: "luis@example.com".to_string(),
            name: Some("Luis".to_string()),
            password: None,
        };
        assert!(matches!(
            service.update_user(&as_ana, update_luis.clone()).await,
            Err(Error::Forbidden { .. })
        ));

        let as_admin = CurrentUser {
            id: 999,
            role: Some(ROLE_ADMIN),
        };
        let updated = service.update_user(&as_admin, update_luis).await.unwrap();
        assert_eq!(updated.name.as_deref(), Some("Luis"));

        let steal_email = UserUpdate {
            id: ana.id,
            email: "luis@example.com".to_string(),
            name: None,
            password: None,
        };
        assert!(matches!(
            service.update_user(&as_ana, steal_email).await,
            Err(Error::Conflict { .. })
        ));
    }

    #[test_log::test(tokio::test)]
    async fn test_update_user_password_is_rehashed() {
        let (service, _, _) = create_test_auth_service();
        let (ana, _) = registered(&service, "ana@example.com").await;
        let caller = CurrentUser {
            id: ana.id,
            role: Some(ROLE_USER),
        };

        service
            .update_user(
                &caller,
                UserUpdate {
                    id: ana.id,
                    email: "ana@example.com".to_string(),
                    name: None,
                    password: Some("new-password-1".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(service.login(login_request("ana@example.com", "password123")).await.is_err());
        assert!(service.login(login_request("ana@example.com", "new-password-1")).await.is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn test_create_user_requires_admin() {
        let (service, _, _) = create_test_auth_service();
        let request = UserCreate {
            email: "nuevo@example.com".to_string(),
            password: "password123".to_string(),
            name: None,
            role: Some(ROLE_ADMIN),
        };

        let user_caller = CurrentUser { id: 1, role: Some(ROLE_USER) };
        assert!(matches!(
            service.create_user(&user_caller, request.clone()).await,
            Err(Error::Forbidden { .. })
        ));

        let admin_caller = CurrentUser { id: 1, role: Some(ROLE_ADMIN) };
        let created = service.create_user(&admin_caller, request).await.unwrap();
        assert_eq!(created.role, ROLE_ADMIN);
    }

    #[test_log::test(tokio::test)]
    async fn test_seed_admin_is_idempotent() {
        let (service, _, _) = create_test_auth_service();

        assert!(service.seed_admin("admin@test.com", "admin-password", "Admin").await.unwrap());
        assert!(!service.seed_admin("admin@test.com", "admin-password", "Admin").await.unwrap());

        let login = service.login(login_request("admin@test.com", "admin-password")).await.unwrap();
        assert_eq!(login.user.role, ROLE_ADMIN);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_secret_key_fails_construction() {
        let mut config = create_test_config();
        config.secret_key = None;
        let result = AuthService::new(
            &config,
            Arc::new(InMemoryCredentialStore::default()),
            Arc::new(InMemoryRefreshTokenStore::default()),
        );
        assert!(matches!(result, Err(Error::Internal { .. })));
    }
}
