//! Request model for document generation.

use super::validation;
use crate::documents::DocumentType;
use crate::errors::{Error, Result};
use crate::types::ReporteId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerarDocumentoRequest {
    /// Reports to include, rendered in this order
    #[schema(example = json!([1, 2, 3]))]
    pub reportes_ids: Vec<ReporteId>,
    /// `pdf` or `excel`
    #[schema(example = "pdf")]
    pub document_type: String,
}

impl GenerarDocumentoRequest {
    /// Check ids and resolve the document type. At most `max_reports` ids are accepted.
    pub fn validate(&self, max_reports: usize) -> Result<(Vec<ReporteId>, DocumentType)> {
        if self.reportes_ids.is_empty() {
            return Err(Error::validation("Debe seleccionar al menos un reporte"));
        }
        if self.reportes_ids.len() > max_reports {
            return Err(Error::validation(format!("No se pueden incluir más de {max_reports} reportes")));
        }

        let ids = self
            .reportes_ids
            .iter()
            .map(|id| validation::positive_id("reportesIds", *id))
            .collect::<Result<Vec<_>>>()?;
        let document_type = self.document_type.parse::<DocumentType>()?;

        Ok((ids, document_type))
    }
}
