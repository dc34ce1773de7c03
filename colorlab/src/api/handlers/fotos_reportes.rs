use axum::{
    Json,
    extract::{Path, State},
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        envelope::ApiMessage,
        fotos_reportes::{FotoReporteCreate, FotoReporteResponse, FotoReporteUpdate, FotosDeletedResponse},
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{FotosReportes, Repository, Reportes, fotos_reportes::FotoReporteFilter},
        models::fotos_reportes::{FotoReporteCreateDBRequest, FotoReporteDBResponse, FotoReporteUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{FotoReporteId, ReporteId},
};

async fn ensure_reporte(conn: &mut PgConnection, reporte_id: ReporteId) -> Result<()> {
    match Reportes::new(conn).get_by_id(reporte_id).await? {
        Some(_) => Ok(()),
        None => Err(Error::not_found("Reporte", reporte_id)),
    }
}

fn into_responses(fotos: Vec<FotoReporteDBResponse>) -> Vec<FotoReporteResponse> {
    fotos.into_iter().map(FotoReporteResponse::from).collect()
}

/// List all photo records
#[utoipa::path(
    get,
    path = "/fotos-reportes",
    tag = "fotos-reportes",
    responses(
        (status = 200, description = "All photos", body = Vec<FotoReporteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_fotos(State(state): State<AppState>, _: CurrentUser) -> Result<ApiMessage<Vec<FotoReporteResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let fotos = FotosReportes::new(&mut pool_conn).list(&FotoReporteFilter::default()).await?;

    Ok(ApiMessage::ok("Fotos obtenidas correctamente", into_responses(fotos)))
}

/// Photos of one report, oldest first
#[utoipa::path(
    get,
    path = "/fotos-reportes/reporte/{reporte_id}",
    tag = "fotos-reportes",
    params(("reporte_id" = i64, Path, description = "Reporte ID")),
    responses(
        (status = 200, description = "Photos of the report", body = Vec<FotoReporteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_fotos_by_reporte(
    State(state): State<AppState>,
    Path(reporte_id): Path<ReporteId>,
    _: CurrentUser,
) -> Result<ApiMessage<Vec<FotoReporteResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let fotos = FotosReportes::new(&mut pool_conn)
        .list(&FotoReporteFilter::by_reporte(reporte_id))
        .await?;

    Ok(ApiMessage::ok("Fotos del reporte obtenidas correctamente", into_responses(fotos)))
}

/// Get a photo record by id
#[utoipa::path(
    get,
    path = "/fotos-reportes/{id}",
    tag = "fotos-reportes",
    params(("id" = i64, Path, description = "Foto ID")),
    responses(
        (status = 200, description = "Photo found", body = FotoReporteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Photo not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_foto(State(state): State<AppState>, Path(id): Path<FotoReporteId>, _: CurrentUser) -> Result<ApiMessage<FotoReporteResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let foto = FotosReportes::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Foto", id))?;

    Ok(ApiMessage::ok("Foto obtenida correctamente", foto.into()))
}

/// Attach a photo record to an existing report
#[utoipa::path(
    post,
    path = "/fotos-reportes",
    tag = "fotos-reportes",
    request_body = FotoReporteCreate,
    responses(
        (status = 201, description = "Photo created", body = FotoReporteResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Report not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_foto(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(request): Json<FotoReporteCreate>,
) -> Result<ApiMessage<FotoReporteResponse>> {
    let request = FotoReporteCreateDBRequest::from(request.validate()?);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    ensure_reporte(&mut tx, request.reporte_id).await?;
    let foto = FotosReportes::new(&mut tx).create(&request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(ApiMessage::created("Foto creada correctamente", foto.into()))
}

/// Replace a photo record
#[utoipa::path(
    put,
    path = "/fotos-reportes/{id}",
    tag = "fotos-reportes",
    request_body = FotoReporteUpdate,
    params(("id" = i64, Path, description = "Foto ID")),
    responses(
        (status = 200, description = "Photo updated", body = FotoReporteResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Photo or report not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_foto(
    State(state): State<AppState>,
    Path(id): Path<FotoReporteId>,
    _: CurrentUser,
    Json(request): Json<FotoReporteUpdate>,
) -> Result<ApiMessage<FotoReporteResponse>> {
    let request = request.validate()?;
    let reporte_id = request.reporte_id;
    let request = FotoReporteUpdateDBRequest::from(request);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    ensure_reporte(&mut tx, reporte_id).await?;
    let foto = match FotosReportes::new(&mut tx).update(id, &request).await {
        Ok(foto) => foto,
        Err(DbError::NotFound) => return Err(Error::not_found("Foto", id)),
        Err(e) => return Err(e.into()),
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(ApiMessage::ok("Foto actualizada correctamente", foto.into()))
}

/// Delete a photo record. The image file is left in place.
#[utoipa::path(
    delete,
    path = "/fotos-reportes/{id}",
    tag = "fotos-reportes",
    params(("id" = i64, Path, description = "Foto ID")),
    responses(
        (status = 200, description = "Photo deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Photo not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_foto(State(state): State<AppState>, Path(id): Path<FotoReporteId>, _: CurrentUser) -> Result<ApiMessage<()>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !FotosReportes::new(&mut pool_conn).delete(id).await? {
        return Err(Error::not_found("Foto", id));
    }

    Ok(ApiMessage::message("Foto eliminada correctamente"))
}

/// Delete every photo record of a report
#[utoipa::path(
    delete,
    path = "/fotos-reportes/reporte/{reporte_id}",
    tag = "fotos-reportes",
    params(("reporte_id" = i64, Path, description = "Reporte ID")),
    responses(
        (status = 200, description = "Photos deleted", body = FotosDeletedResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_fotos_by_reporte(
    State(state): State<AppState>,
    Path(reporte_id): Path<ReporteId>,
    _: CurrentUser,
) -> Result<ApiMessage<FotosDeletedResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = FotosReportes::new(&mut pool_conn).delete_by_reporte(reporte_id).await?;

    Ok(ApiMessage::ok(
        "Fotos del reporte eliminadas correctamente",
        FotosDeletedResponse { reporte_id, deleted },
    ))
}

#[cfg(test)]
mod tests {
    use crate::{test_utils::create_test_app, types::ROLE_USER};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_routes_require_token() {
        let app = create_test_app();

        app.server.get("/api/fotos-reportes").await.assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .get("/api/fotos-reportes/reporte/1")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .delete("/api/fotos-reportes/reporte/1")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_path_like_filenames_are_rejected() {
        let app = create_test_app();

        let response = app
            .server
            .post("/api/fotos-reportes")
            .add_header("authorization", app.bearer(1, ROLE_USER))
            .json(&json!({ "reporteId": 1, "filename": "../../etc/passwd" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>()["error"], true);
    }
}
