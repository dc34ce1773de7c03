//! Bearer access-token extraction for handlers.
//!
//! Any handler taking a [`CurrentUser`] argument is protected: the request must carry
//! `Authorization: Bearer <access token>` signed with the configured secret and not yet expired.
//! Refresh tokens are rejected here.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
};

/// Pull the raw token out of an `Authorization: Bearer ...` header.
fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts.headers.get(AUTHORIZATION).ok_or(Error::Unauthenticated { message: None })?;

    let value = header.to_str().map_err(|_| Error::Unauthenticated {
        message: Some("Cabecera de autorización inválida".to_string()),
    })?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Cabecera de autorización inválida".to_string()),
        })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts)?;
        let user = state.auth.authenticate(token)?;
        trace!(user_id = user.id, "Authenticated request");
        Ok(user)
    }
}
