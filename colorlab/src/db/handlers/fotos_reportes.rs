//! Database repository for report photos.

use std::collections::HashMap;

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::fotos_reportes::{FotoReporteCreateDBRequest, FotoReporteDBResponse, FotoReporteUpdateDBRequest},
};
use crate::types::{FotoReporteId, ReporteId};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Filter for listing photos. Photos are always returned oldest first.
#[derive(Debug, Clone, Default)]
pub struct FotoReporteFilter {
    pub reporte_id: Option<ReporteId>,
    pub skip: i64,
    pub limit: Option<i64>,
}

impl FotoReporteFilter {
    pub fn by_reporte(reporte_id: ReporteId) -> Self {
        Self {
            reporte_id: Some(reporte_id),
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(reporte_id) = self.reporte_id {
            query.push(" WHERE reporte_id = ").push_bind(reporte_id);
        }
    }
}

pub struct FotosReportes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> FotosReportes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Photos for several reports in one round trip, grouped by report and ordered by
    /// creation time. Reports without photos are absent from the map.
    #[instrument(skip(self, reporte_ids), fields(count = reporte_ids.len()), err)]
    pub async fn list_for_reportes(&mut self, reporte_ids: &[ReporteId]) -> Result<HashMap<ReporteId, Vec<FotoReporteDBResponse>>> {
        let fotos = sqlx::query_as::<_, FotoReporteDBResponse>(
            "SELECT * FROM fotos_reportes WHERE reporte_id = ANY($1) ORDER BY reporte_id, created_at ASC, id ASC",
        )
        .bind(reporte_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut grouped: HashMap<ReporteId, Vec<FotoReporteDBResponse>> = HashMap::new();
        for foto in fotos {
            grouped.entry(foto.reporte_id).or_default().push(foto);
        }
        Ok(grouped)
    }

    /// Delete every photo of a report, returning how many rows were removed
    #[instrument(skip(self), err)]
    pub async fn delete_by_reporte(&mut self, reporte_id: ReporteId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM fotos_reportes WHERE reporte_id = $1")
            .bind(reporte_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for FotosReportes<'c> {
    type CreateRequest = FotoReporteCreateDBRequest;
    type UpdateRequest = FotoReporteUpdateDBRequest;
    type Response = FotoReporteDBResponse;
    type Id = FotoReporteId;
    type Filter = FotoReporteFilter;

    #[instrument(skip(self, request), fields(reporte_id = request.reporte_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let foto = sqlx::query_as::<_, FotoReporteDBResponse>(
            "INSERT INTO fotos_reportes (reporte_id, filename) VALUES ($1, $2) RETURNING *",
        )
        .bind(request.reporte_id)
        .bind(&request.filename)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(foto)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let foto = sqlx::query_as::<_, FotoReporteDBResponse>("SELECT * FROM fotos_reportes WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(foto)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let fotos = sqlx::query_as::<_, FotoReporteDBResponse>("SELECT * FROM fotos_reportes WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(fotos.into_iter().map(|f| (f.id, f)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM fotos_reportes");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY created_at ASC, id ASC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }
        query.push(" OFFSET ").push_bind(filter.skip);

        let fotos = query.build_query_as::<FotoReporteDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(fotos)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM fotos_reportes");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM fotos_reportes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let foto = sqlx::query_as::<_, FotoReporteDBResponse>(
            r#"
            UPDATE fotos_reportes SET
                reporte_id = COALESCE($2, reporte_id),
                filename = COALESCE($3, filename),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.reporte_id)
        .bind(&request.filename)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(foto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_cliente, seed_coloracion, seed_foto, seed_reporte};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_list_for_reportes_groups_in_upload_order(pool: PgPool) {
        let cliente = seed_cliente(&pool, "María López").await;
        let coloracion = seed_coloracion(&pool, "Rubio ceniza").await;
        let fecha = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let first = seed_reporte(&pool, cliente.id, coloracion.id, fecha, Decimal::new(40, 0)).await;
        let second = seed_reporte(&pool, cliente.id, coloracion.id, fecha, Decimal::new(40, 0)).await;
        let bare = seed_reporte(&pool, cliente.id, coloracion.id, fecha, Decimal::new(40, 0)).await;

        seed_foto(&pool, second.id, "despues.jpg").await;
        seed_foto(&pool, first.id, "antes.jpg").await;
        seed_foto(&pool, second.id, "detalle.jpg").await;
        seed_foto(&pool, first.id, "durante.jpg").await;

        let mut conn = pool.acquire().await.unwrap();
        let grouped = FotosReportes::new(&mut conn)
            .list_for_reportes(&[first.id, second.id, bare.id])
            .await
            .unwrap();

        let names = |id: ReporteId| -> Vec<String> { grouped[&id].iter().map(|f| f.filename.clone()).collect() };
        assert_eq!(names(first.id), vec!["antes.jpg", "durante.jpg"]);
        assert_eq!(names(second.id), vec!["despues.jpg", "detalle.jpg"]);
        assert!(!grouped.contains_key(&bare.id));
    }
}
