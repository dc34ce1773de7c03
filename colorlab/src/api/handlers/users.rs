use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        envelope::ApiMessage,
        pagination::PaginatedResponse,
        users::{CurrentUser, UserCreate, UserResponse, UserSearchQuery, UserUpdate},
    },
    auth::service::require_admin,
    db::handlers::{Repository, Users, users::UserFilter},
    errors::{Error, Result},
    types::UserId,
};

/// Get a user by id
#[utoipa::path(
    get,
    path = "/user/get-user-by-id/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user_by_id(State(state): State<AppState>, Path(id): Path<UserId>, _: CurrentUser) -> Result<ApiMessage<UserResponse>> {
    let user = state.auth.get_user(id).await?;
    Ok(ApiMessage::ok("Usuario obtenido correctamente", user))
}

/// Get a user by email
#[utoipa::path(
    get,
    path = "/user/get-user-by-email/{email}",
    tag = "users",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
    _: CurrentUser,
) -> Result<ApiMessage<UserResponse>> {
    let user = state.auth.get_user_by_email(&email).await?;
    Ok(ApiMessage::ok("Usuario obtenido correctamente", user))
}

/// Update a user's email, name and optionally password. Users may only update themselves unless admin.
#[utoipa::path(
    put,
    path = "/user/update-user",
    tag = "users",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not allowed to update this user"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<UserUpdate>,
) -> Result<ApiMessage<UserResponse>> {
    let user = state.auth.update_user(&current_user, request).await?;
    Ok(ApiMessage::ok("Usuario actualizado correctamente", user))
}

/// Create a user with an explicit role (admin only)
#[utoipa::path(
    post,
    path = "/user",
    tag = "users",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "User already exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<UserCreate>,
) -> Result<ApiMessage<UserResponse>> {
    let user = state.auth.create_user(&current_user, request).await?;
    Ok(ApiMessage::created("Usuario creado correctamente", user))
}

/// Search users with pagination (admin only)
#[utoipa::path(
    get,
    path = "/user/search",
    tag = "users",
    params(UserSearchQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
        (status = 403, description = "Admin role required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
    current_user: CurrentUser,
) -> Result<ApiMessage<PaginatedResponse<UserResponse>>> {
    require_admin(&current_user, "buscar usuarios")?;

    let filter = UserFilter {
        email: query.email.clone(),
        name: query.name.clone(),
        role_id: query.role()?,
        sort: query.pagination.sort(),
        ..UserFilter::new(query.pagination.offset(), query.pagination.size())
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);
    let users = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    let items = users.into_iter().map(UserResponse::from).collect();
    Ok(ApiMessage::ok(
        "Usuarios obtenidos correctamente",
        PaginatedResponse::new(items, total, &query.pagination),
    ))
}
