use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        clientes::{ClienteCreate, ClientePageQuery, ClienteResponse, ClienteSearchQuery, ClienteUpdate},
        envelope::ApiMessage,
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Clientes, Repository, clientes::ClienteFilter},
        models::clientes::{ClienteCreateDBRequest, ClienteUpdateDBRequest},
    },
    errors::{Error, Result},
    types::ClienteId,
};

/// List all clientes
#[utoipa::path(
    get,
    path = "/clientes",
    tag = "clientes",
    responses(
        (status = 200, description = "All clientes", body = Vec<ClienteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_clientes(State(state): State<AppState>, _: CurrentUser) -> Result<ApiMessage<Vec<ClienteResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let clientes = Clientes::new(&mut pool_conn).list(&ClienteFilter::default()).await?;

    Ok(ApiMessage::ok(
        "Clientes obtenidos correctamente",
        clientes.into_iter().map(ClienteResponse::from).collect(),
    ))
}

/// Free-text search over nombre, email and telefono
#[utoipa::path(
    get,
    path = "/clientes/search",
    tag = "clientes",
    params(ClienteSearchQuery),
    responses(
        (status = 200, description = "Matching clientes", body = Vec<ClienteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_clientes(
    State(state): State<AppState>,
    Query(query): Query<ClienteSearchQuery>,
    _: CurrentUser,
) -> Result<ApiMessage<Vec<ClienteResponse>>> {
    let filter = query.q.map(ClienteFilter::search).unwrap_or_default();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let clientes = Clientes::new(&mut pool_conn).list(&filter).await?;

    Ok(ApiMessage::ok(
        "Clientes obtenidos correctamente",
        clientes.into_iter().map(ClienteResponse::from).collect(),
    ))
}

/// Paginated search with per-field filters and sorting
#[utoipa::path(
    get,
    path = "/clientes/paginated",
    tag = "clientes",
    params(ClientePageQuery),
    responses(
        (status = 200, description = "Page of clientes", body = PaginatedResponse<ClienteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn paginate_clientes(
    State(state): State<AppState>,
    Query(query): Query<ClientePageQuery>,
    _: CurrentUser,
) -> Result<ApiMessage<PaginatedResponse<ClienteResponse>>> {
    let filter = ClienteFilter {
        nombre: query.nombre.clone(),
        email: query.email.clone(),
        telefono: query.telefono.clone(),
        sort: query.pagination.sort(),
        ..ClienteFilter::new(query.pagination.offset(), query.pagination.size())
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clientes::new(&mut pool_conn);
    let clientes = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    let items = clientes.into_iter().map(ClienteResponse::from).collect();
    Ok(ApiMessage::ok(
        "Clientes obtenidos correctamente",
        PaginatedResponse::new(items, total, &query.pagination),
    ))
}

/// Get a cliente by id
#[utoipa::path(
    get,
    path = "/clientes/{id}",
    tag = "clientes",
    params(("id" = i64, Path, description = "Cliente ID")),
    responses(
        (status = 200, description = "Cliente found", body = ClienteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Cliente not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_cliente(State(state): State<AppState>, Path(id): Path<ClienteId>, _: CurrentUser) -> Result<ApiMessage<ClienteResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let cliente = Clientes::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Cliente", id))?;

    Ok(ApiMessage::ok("Cliente obtenido correctamente", cliente.into()))
}

/// Create a cliente
#[utoipa::path(
    post,
    path = "/clientes",
    tag = "clientes",
    request_body = ClienteCreate,
    responses(
        (status = 201, description = "Cliente created", body = ClienteResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_cliente(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(request): Json<ClienteCreate>,
) -> Result<ApiMessage<ClienteResponse>> {
    let request = ClienteCreateDBRequest::from(request.validate()?);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let cliente = Clientes::new(&mut pool_conn).create(&request).await?;

    Ok(ApiMessage::created("Cliente creado correctamente", cliente.into()))
}

/// Replace a cliente's fields
#[utoipa::path(
    put,
    path = "/clientes/{id}",
    tag = "clientes",
    request_body = ClienteUpdate,
    params(("id" = i64, Path, description = "Cliente ID")),
    responses(
        (status = 200, description = "Cliente updated", body = ClienteResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Cliente not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_cliente(
    State(state): State<AppState>,
    Path(id): Path<ClienteId>,
    _: CurrentUser,
    Json(request): Json<ClienteUpdate>,
) -> Result<ApiMessage<ClienteResponse>> {
    let request = ClienteUpdateDBRequest::from(request.validate()?);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let cliente = match Clientes::new(&mut pool_conn).update(id, &request).await {
        Ok(cliente) => cliente,
        Err(DbError::NotFound) => return Err(Error::not_found("Cliente", id)),
        Err(e) => return Err(e.into()),
    };

    Ok(ApiMessage::ok("Cliente actualizado correctamente", cliente.into()))
}

/// Delete a cliente. Fails while reports still reference it.
#[utoipa::path(
    delete,
    path = "/clientes/{id}",
    tag = "clientes",
    params(("id" = i64, Path, description = "Cliente ID")),
    responses(
        (status = 200, description = "Cliente deleted"),
        (status = 400, description = "Cliente still has reports"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Cliente not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_cliente(State(state): State<AppState>, Path(id): Path<ClienteId>, _: CurrentUser) -> Result<ApiMessage<()>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Clientes::new(&mut pool_conn).delete(id).await? {
        return Err(Error::not_found("Cliente", id));
    }

    Ok(ApiMessage::message("Cliente eliminado correctamente"))
}

#[cfg(test)]
mod tests {
    use crate::{test_utils::create_test_app, types::ROLE_USER};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_routes_require_token() {
        let app = create_test_app();

        app.server.get("/api/clientes").await.assert_status(StatusCode::UNAUTHORIZED);
        app.server.get("/api/clientes/search?q=ana").await.assert_status(StatusCode::UNAUTHORIZED);
        app.server.get("/api/clientes/7").await.assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .post("/api/clientes")
            .json(&json!({ "nombre": "Ana", "email": "ana@example.com", "telefono": "555" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server.delete("/api/clientes/7").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_body_is_rejected_before_storage() {
        let app = create_test_app();

        let response = app
            .server
            .post("/api/clientes")
            .add_header("authorization", app.bearer(1, ROLE_USER))
            .json(&json!({ "nombre": "Ana", "email": "no-es-email", "telefono": "555" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], 400);
        assert_eq!(body["error"], true);

        app.server
            .put("/api/clientes/3")
            .add_header("authorization", app.bearer(1, ROLE_USER))
            .json(&json!({ "nombre": "", "email": "ana@example.com", "telefono": "555" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
