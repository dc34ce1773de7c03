use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        documents::GenerarDocumentoRequest,
        envelope::ApiMessage,
        reportes::{DateRangeQuery, ReporteCreate, ReporteResponse, ReporteUpdate},
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Clientes, Coloraciones, Repository, Reportes, reportes::ReporteFilter},
        models::reportes::{ReporteCreateDBRequest, ReporteUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{ClienteId, ColoracionId, ReporteId},
};

/// Reports must point at an existing cliente and coloracion
async fn ensure_references(conn: &mut PgConnection, cliente_id: ClienteId, coloracion_id: ColoracionId) -> Result<()> {
    if Clientes::new(&mut *conn).get_by_id(cliente_id).await?.is_none() {
        return Err(Error::not_found("Cliente", cliente_id));
    }
    if Coloraciones::new(&mut *conn).get_by_id(coloracion_id).await?.is_none() {
        return Err(Error::not_found("Coloración", coloracion_id));
    }
    Ok(())
}

fn into_responses(reportes: Vec<crate::db::models::reportes::ReporteDBResponse>) -> Vec<ReporteResponse> {
    reportes.into_iter().map(ReporteResponse::from).collect()
}

/// List all reports, most recent service first
#[utoipa::path(
    get,
    path = "/reportes",
    tag = "reportes",
    responses(
        (status = 200, description = "All reports", body = Vec<ReporteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_reportes(State(state): State<AppState>, _: CurrentUser) -> Result<ApiMessage<Vec<ReporteResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reportes = Reportes::new(&mut pool_conn).list(&ReporteFilter::default()).await?;

    Ok(ApiMessage::ok("Reportes obtenidos correctamente", into_responses(reportes)))
}

/// Reports whose service date falls in `[startDate, endDate]`
#[utoipa::path(
    get,
    path = "/reportes/date-range",
    tag = "reportes",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Reports in range", body = Vec<ReporteResponse>),
        (status = 400, description = "Invalid or inverted dates"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_reportes_by_date_range(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
    _: CurrentUser,
) -> Result<ApiMessage<Vec<ReporteResponse>>> {
    query.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reportes = Reportes::new(&mut pool_conn)
        .list(&ReporteFilter::date_range(query.start_date, query.end_date))
        .await?;

    Ok(ApiMessage::ok("Reportes obtenidos correctamente", into_responses(reportes)))
}

/// Reports of one cliente
#[utoipa::path(
    get,
    path = "/reportes/cliente/{cliente_id}",
    tag = "reportes",
    params(("cliente_id" = i64, Path, description = "Cliente ID")),
    responses(
        (status = 200, description = "Reports of the cliente", body = Vec<ReporteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_reportes_by_cliente(
    State(state): State<AppState>,
    Path(cliente_id): Path<ClienteId>,
    _: CurrentUser,
) -> Result<ApiMessage<Vec<ReporteResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reportes = Reportes::new(&mut pool_conn).list(&ReporteFilter::by_cliente(cliente_id)).await?;

    Ok(ApiMessage::ok("Reportes del cliente obtenidos correctamente", into_responses(reportes)))
}

/// Get a report by id
#[utoipa::path(
    get,
    path = "/reportes/{id}",
    tag = "reportes",
    params(("id" = i64, Path, description = "Reporte ID")),
    responses(
        (status = 200, description = "Report found", body = ReporteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Report not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_reporte(State(state): State<AppState>, Path(id): Path<ReporteId>, _: CurrentUser) -> Result<ApiMessage<ReporteResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reporte = Reportes::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Reporte", id))?;

    Ok(ApiMessage::ok("Reporte obtenido correctamente", reporte.into()))
}

/// Create a report for an existing cliente and coloracion
#[utoipa::path(
    post,
    path = "/reportes",
    tag = "reportes",
    request_body = ReporteCreate,
    responses(
        (status = 201, description = "Report created", body = ReporteResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Cliente or coloracion not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_reporte(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(request): Json<ReporteCreate>,
) -> Result<ApiMessage<ReporteResponse>> {
    let request = ReporteCreateDBRequest::from(request.validate()?);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    ensure_references(&mut tx, request.cliente_id, request.coloracion_id).await?;
    let reporte = Reportes::new(&mut tx).create(&request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(ApiMessage::created("Reporte creado correctamente", reporte.into()))
}

/// Replace a report's fields
#[utoipa::path(
    put,
    path = "/reportes/{id}",
    tag = "reportes",
    request_body = ReporteUpdate,
    params(("id" = i64, Path, description = "Reporte ID")),
    responses(
        (status = 200, description = "Report updated", body = ReporteResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Report, cliente or coloracion not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_reporte(
    State(state): State<AppState>,
    Path(id): Path<ReporteId>,
    _: CurrentUser,
    Json(request): Json<ReporteUpdate>,
) -> Result<ApiMessage<ReporteResponse>> {
    let request = request.validate()?;
    let (cliente_id, coloracion_id) = (request.cliente_id, request.coloracion_id);
    let request = ReporteUpdateDBRequest::from(request);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    ensure_references(&mut tx, cliente_id, coloracion_id).await?;
    let reporte = match Reportes::new(&mut tx).update(id, &request).await {
        Ok(reporte) => reporte,
        Err(DbError::NotFound) => return Err(Error::not_found("Reporte", id)),
        Err(e) => return Err(e.into()),
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(ApiMessage::ok("Reporte actualizado correctamente", reporte.into()))
}

/// Delete a report together with its photo records
#[utoipa::path(
    delete,
    path = "/reportes/{id}",
    tag = "reportes",
    params(("id" = i64, Path, description = "Reporte ID")),
    responses(
        (status = 200, description = "Report deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Report not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_reporte(State(state): State<AppState>, Path(id): Path<ReporteId>, _: CurrentUser) -> Result<ApiMessage<()>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Reportes::new(&mut pool_conn).delete(id).await? {
        return Err(Error::not_found("Reporte", id));
    }

    Ok(ApiMessage::message("Reporte eliminado correctamente"))
}

/// Render the selected reports as a PDF or spreadsheet (CSV) attachment.
///
/// Nothing is produced unless every requested report exists.
#[utoipa::path(
    post,
    path = "/reportes/generar-documento",
    tag = "reportes",
    request_body = GenerarDocumentoRequest,
    responses(
        (status = 200, description = "Document bytes", content_type = "application/octet-stream"),
        (status = 400, description = "Empty selection, too many reports or unknown document type"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "A requested report does not exist"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn generar_documento(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(request): Json<GenerarDocumentoRequest>,
) -> Result<Response> {
    let (ids, document_type) = request.validate(state.config.documents.max_reports)?;
    let document = state.documents.generate(state.reports.as_ref(), &ids, document_type).await?;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, document.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}
