use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, LoginResponse, LogoutAllRequest, LogoutAllResponse, RefreshRequest, RegisterRequest, TokenPairResponse},
        envelope::ApiMessage,
        users::{CurrentUser, UserResponse},
    },
    errors::{Error, Result},
};

/// Register a new user account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "auth",
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "User already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<ApiMessage<UserResponse>> {
    let user = state.auth.register(request).await?;
    Ok(ApiMessage::created("Usuario registrado correctamente", user))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<ApiMessage<LoginResponse>> {
    let session = state.auth.login(request).await?;
    Ok(ApiMessage::ok("Inicio de sesión exitoso", session))
}

/// Exchange a refresh token for a new token pair. The presented token is consumed.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    tag = "auth",
    responses(
        (status = 200, description = "New token pair", body = TokenPairResponse),
        (status = 401, description = "Refresh token invalid, expired or already used"),
        (status = 404, description = "User no longer exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<ApiMessage<TokenPairResponse>> {
    let pair = state.auth.refresh(request).await?;
    Ok(ApiMessage::ok("Token de refresco exitoso", pair))
}

/// End one session by revoking its refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = RefreshRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Session closed"),
        (status = 401, description = "Token invalid or issued to another user"),
        (status = 404, description = "Token already revoked"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<ApiMessage<()>> {
    state.auth.logout(request).await?;
    Ok(ApiMessage::message("Sesión cerrada exitosamente"))
}

/// Revoke every refresh token of the calling user
#[utoipa::path(
    post,
    path = "/auth/logout-all",
    request_body = LogoutAllRequest,
    tag = "auth",
    responses(
        (status = 200, description = "All sessions closed", body = LogoutAllResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "userId does not match the caller"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout_all(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<LogoutAllRequest>,
) -> Result<ApiMessage<LogoutAllResponse>> {
    if current_user.id != request.user_id {
        return Err(Error::Forbidden {
            action: "cerrar las sesiones de otro usuario".to_string(),
        });
    }

    let revoked = state.auth.logout_all(request.user_id).await?;
    Ok(ApiMessage::ok(
        "Todas las sesiones han sido cerradas exitosamente",
        LogoutAllResponse { revoked },
    ))
}
