//! Joins reports with their photos for document generation.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::{
    db::{
        handlers::{FotosReportes, Repository, Reportes},
        models::{fotos_reportes::FotoReporteDBResponse, reportes::ReporteDBResponse},
    },
    errors::{Error, Result},
    types::ReporteId,
};

/// A report with cliente and coloracion names joined, plus its photos oldest first.
#[derive(Debug, Clone)]
pub struct ReporteConFotos {
    pub reporte: ReporteDBResponse,
    pub fotos: Vec<FotoReporteDBResponse>,
}

/// Read access to reports and photos, batched by id.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Joined reports keyed by id. Unknown ids are absent from the map.
    async fn reportes(&self, ids: &[ReporteId]) -> Result<HashMap<ReporteId, ReporteDBResponse>>;

    /// Photos grouped by report, each group ordered by creation time.
    async fn fotos(&self, ids: &[ReporteId]) -> Result<HashMap<ReporteId, Vec<FotoReporteDBResponse>>>;
}

/// Build one [`ReporteConFotos`] per requested id, in request order.
///
/// Fails with `NotFound` on the first id that does not exist and returns nothing in that case.
#[instrument(skip(source, ids), fields(count = ids.len()))]
pub async fn aggregate(source: &dyn ReportSource, ids: &[ReporteId]) -> Result<Vec<ReporteConFotos>> {
    let reportes = source.reportes(ids).await?;

    if let Some(missing) = ids.iter().find(|id| !reportes.contains_key(*id)) {
        return Err(Error::not_found("Reporte", missing));
    }

    let fotos = source.fotos(ids).await?;

    let mut aggregated = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(reporte) = reportes.get(id) else {
            return Err(Error::not_found("Reporte", id));
        };
        aggregated.push(ReporteConFotos {
            reporte: reporte.clone(),
            fotos: fotos.get(id).cloned().unwrap_or_default(),
        });
    }

    Ok(aggregated)
}

/// [`ReportSource`] over the `reportes` and `fotos_reportes` tables.
#[derive(Clone)]
pub struct PgReportSource {
    db: PgPool,
}

impl PgReportSource {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportSource for PgReportSource {
    #[instrument(skip_all, fields(count = ids.len()))]
    async fn reportes(&self, ids: &[ReporteId]) -> Result<HashMap<ReporteId, ReporteDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(Reportes::new(&mut conn).get_bulk(ids.to_vec()).await?)
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    async fn fotos(&self, ids: &[ReporteId]) -> Result<HashMap<ReporteId, Vec<FotoReporteDBResponse>>> {
        let mut conn = self.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(FotosReportes::new(&mut conn).list_for_reportes(ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryReportSource, sample_foto, sample_reporte};

    fn source() -> InMemoryReportSource {
        let source = InMemoryReportSource::default();
        source.insert(sample_reporte(1), vec![]);
        source.insert(sample_reporte(2), vec![sample_foto(10, 2, "a.jpg"), sample_foto(11, 2, "b.jpg")]);
        source.insert(sample_reporte(3), vec![sample_foto(12, 3, "c.png")]);
        source
    }

    #[test_log::test(tokio::test)]
    async fn test_preserves_input_order() {
        let aggregated = aggregate(&source(), &[3, 1, 2]).await.unwrap();

        let ids: Vec<_> = aggregated.iter().map(|r| r.reporte.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(aggregated[1].fotos.is_empty());
        let filenames: Vec<_> = aggregated[2].fotos.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(filenames, vec!["a.jpg", "b.jpg"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_id_fails_whole_batch() {
        let err = aggregate(&source(), &[1, 99, 2]).await.unwrap_err();
        match err {
            Error::NotFound { resource, id } => {
                assert_eq!(resource, "Reporte");
                assert_eq!(id, "99");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_repeated_ids_keep_their_photos() {
        let aggregated = aggregate(&source(), &[2, 2]).await.unwrap();
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].fotos.len(), 2);
        assert_eq!(aggregated[1].fotos.len(), 2);
    }
}
