//! Database models for report photos.

use crate::types::{FotoReporteId, ReporteId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct FotoReporteCreateDBRequest {
    pub reporte_id: ReporteId,
    pub filename: String,
}

#[derive(Debug, Clone, Default)]
pub struct FotoReporteUpdateDBRequest {
    pub reporte_id: Option<ReporteId>,
    pub filename: Option<String>,
}

/// Photo metadata. The file itself lives in the image directory, referenced by `filename`.
#[derive(Debug, Clone, FromRow)]
pub struct FotoReporteDBResponse {
    pub id: FotoReporteId,
    pub reporte_id: ReporteId,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
