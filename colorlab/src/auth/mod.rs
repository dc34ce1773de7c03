//! Authentication and authorization.
//!
//! Clients authenticate with a pair of HS256 JWTs:
//!
//! - **Access token**: short lived, sent as `Authorization: Bearer <token>` on every protected
//!   route. Verified statelessly from the signature and expiry.
//! - **Refresh token**: long lived, only accepted by `/api/auth/refresh` and `/api/auth/logout`.
//!   Its SHA-256 hash is stored, and each token can be used exactly once.
//!
//! Roles are integer tiers (see [`crate::types`]). Admin-only operations call
//! [`service::require_admin`].
//!
//! # Modules
//!
//! - [`current_user`]: Extractor that turns a Bearer header into a [`crate::api::models::users::CurrentUser`]
//! - [`password`]: Password hashing and verification using Argon2
//! - [`service`]: Register, login, refresh rotation, logout and user management
//! - [`stores`]: Credential and refresh token persistence behind traits
//! - [`tokens`]: JWT signing, verification and token hashing
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use colorlab::api::models::users::CurrentUser;
//! use axum::extract::State;
//!
//! async fn protected_handler(user: CurrentUser, State(state): State<AppState>) -> Result<String> {
//!     Ok(format!("Hola, usuario {}", user.id))
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod service;
pub mod stores;
pub mod tokens;
