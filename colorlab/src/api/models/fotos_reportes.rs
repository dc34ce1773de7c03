//! API request/response models for report photos.

use super::validation::{self, MAX_TEXT_LENGTH};
use crate::db::models::fotos_reportes::{FotoReporteCreateDBRequest, FotoReporteDBResponse, FotoReporteUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{FotoReporteId, ReporteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Photo metadata. The image itself is uploaded out of band into the image directory
/// and served under `/images/{filename}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FotoReporteCreate {
    pub reporte_id: ReporteId,
    #[schema(example = "reporte_12_antes.jpg")]
    pub filename: String,
}

pub type FotoReporteUpdate = FotoReporteCreate;

impl FotoReporteCreate {
    pub fn validate(self) -> Result<Self> {
        let filename =
            validation::required_text("filename", &self.filename, MAX_TEXT_LENGTH).map_err(|_| Error::validation("El nombre del archivo es requerido"))?;
        // Only bare names; anything else could escape the image directory when rendered
        if filename.contains(['/', '\\']) || filename == "." || filename == ".." {
            return Err(Error::validation("El nombre del archivo no puede contener rutas"));
        }

        Ok(Self {
            reporte_id: validation::positive_id("reporteId", self.reporte_id)?,
            filename,
        })
    }
}

impl From<FotoReporteCreate> for FotoReporteCreateDBRequest {
    fn from(create: FotoReporteCreate) -> Self {
        Self {
            reporte_id: create.reporte_id,
            filename: create.filename,
        }
    }
}

impl From<FotoReporteCreate> for FotoReporteUpdateDBRequest {
    fn from(update: FotoReporteCreate) -> Self {
        Self {
            reporte_id: Some(update.reporte_id),
            filename: Some(update.filename),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FotoReporteResponse {
    pub id: FotoReporteId,
    pub reporte_id: ReporteId,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FotoReporteDBResponse> for FotoReporteResponse {
    fn from(db: FotoReporteDBResponse) -> Self {
        Self {
            id: db.id,
            reporte_id: db.reporte_id,
            filename: db.filename,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Result of deleting every photo of a report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FotosDeletedResponse {
    pub reporte_id: ReporteId,
    pub deleted: u64,
}
