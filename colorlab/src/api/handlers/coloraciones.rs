use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        coloraciones::{ColoracionCreate, ColoracionResponse, ColoracionSearchQuery, ColoracionUpdate},
        envelope::ApiMessage,
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Coloraciones, Repository, coloraciones::ColoracionFilter},
        models::coloraciones::{ColoracionCreateDBRequest, ColoracionUpdateDBRequest},
    },
    errors::{Error, Result},
    types::ColoracionId,
};

/// List all coloraciones, ordered by nombre
#[utoipa::path(
    get,
    path = "/coloraciones",
    tag = "coloraciones",
    responses(
        (status = 200, description = "All coloraciones", body = Vec<ColoracionResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_coloraciones(State(state): State<AppState>, _: CurrentUser) -> Result<ApiMessage<Vec<ColoracionResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let coloraciones = Coloraciones::new(&mut pool_conn).list(&ColoracionFilter::default()).await?;

    Ok(ApiMessage::ok(
        "Coloraciones obtenidas correctamente",
        coloraciones.into_iter().map(ColoracionResponse::from).collect(),
    ))
}

/// Free-text search over nombre and descripcion
#[utoipa::path(
    get,
    path = "/coloraciones/search",
    tag = "coloraciones",
    params(ColoracionSearchQuery),
    responses(
        (status = 200, description = "Matching coloraciones", body = Vec<ColoracionResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_coloraciones(
    State(state): State<AppState>,
    Query(query): Query<ColoracionSearchQuery>,
    _: CurrentUser,
) -> Result<ApiMessage<Vec<ColoracionResponse>>> {
    let filter = query.q.map(ColoracionFilter::search).unwrap_or_default();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let coloraciones = Coloraciones::new(&mut pool_conn).list(&filter).await?;

    Ok(ApiMessage::ok(
        "Coloraciones obtenidas correctamente",
        coloraciones.into_iter().map(ColoracionResponse::from).collect(),
    ))
}

/// Get a coloracion by id
#[utoipa::path(
    get,
    path = "/coloraciones/{id}",
    tag = "coloraciones",
    params(("id" = i64, Path, description = "Coloracion ID")),
    responses(
        (status = 200, description = "Coloracion found", body = ColoracionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Coloracion not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_coloracion(State(state): State<AppState>, Path(id): Path<ColoracionId>, _: CurrentUser) -> Result<ApiMessage<ColoracionResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let coloracion = Coloraciones::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Coloración", id))?;

    Ok(ApiMessage::ok("Coloración obtenida correctamente", coloracion.into()))
}

/// Create a coloracion
#[utoipa::path(
    post,
    path = "/coloraciones",
    tag = "coloraciones",
    request_body = ColoracionCreate,
    responses(
        (status = 201, description = "Coloracion created", body = ColoracionResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_coloracion(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(request): Json<ColoracionCreate>,
) -> Result<ApiMessage<ColoracionResponse>> {
    let request = ColoracionCreateDBRequest::from(request.validate()?);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let coloracion = Coloraciones::new(&mut pool_conn).create(&request).await?;

    Ok(ApiMessage::created("Coloración creada correctamente", coloracion.into()))
}

/// Replace a coloracion's fields
#[utoipa::path(
    put,
    path = "/coloraciones/{id}",
    tag = "coloraciones",
    request_body = ColoracionUpdate,
    params(("id" = i64, Path, description = "Coloracion ID")),
    responses(
        (status = 200, description = "Coloracion updated", body = ColoracionResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Coloracion not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_coloracion(
    State(state): State<AppState>,
    Path(id): Path<ColoracionId>,
    _: CurrentUser,
    Json(request): Json<ColoracionUpdate>,
) -> Result<ApiMessage<ColoracionResponse>> {
    let request = ColoracionUpdateDBRequest::from(request.validate()?);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let coloracion = match Coloraciones::new(&mut pool_conn).update(id, &request).await {
        Ok(coloracion) => coloracion,
        Err(DbError::NotFound) => return Err(Error::not_found("Coloración", id)),
        Err(e) => return Err(e.into()),
    };

    Ok(ApiMessage::ok("Coloración actualizada correctamente", coloracion.into()))
}

/// Delete a coloracion. Fails while reports still reference it.
#[utoipa::path(
    delete,
    path = "/coloraciones/{id}",
    tag = "coloraciones",
    params(("id" = i64, Path, description = "Coloracion ID")),
    responses(
        (status = 200, description = "Coloracion deleted"),
        (status = 400, description = "Coloracion still used by reports"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Coloracion not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_coloracion(State(state): State<AppState>, Path(id): Path<ColoracionId>, _: CurrentUser) -> Result<ApiMessage<()>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Coloraciones::new(&mut pool_conn).delete(id).await? {
        return Err(Error::not_found("Coloración", id));
    }

    Ok(ApiMessage::message("Coloración eliminada correctamente"))
}

#[cfg(test)]
mod tests {
    use crate::{test_utils::create_test_app, types::ROLE_USER};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_routes_require_token() {
        let app = create_test_app();

        app.server.get("/api/coloraciones").await.assert_status(StatusCode::UNAUTHORIZED);
        app.server.get("/api/coloraciones/search?q=rubio").await.assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .put("/api/coloraciones/1")
            .json(&json!({ "nombre": "Caoba", "descripcion": "Rojo" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_descripcion_is_rejected() {
        let app = create_test_app();

        let response = app
            .server
            .post("/api/coloraciones")
            .add_header("authorization", app.bearer(1, ROLE_USER))
            .json(&json!({ "nombre": "Caoba", "descripcion": "  " }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["code"], 400);
    }
}
