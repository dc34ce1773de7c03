//! Database repository for reportes.
//!
//! Every read joins the cliente and coloracion so callers (handlers and the document
//! aggregator) get display names without further lookups.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::{
        repository::Repository,
        sorting::{Sort, SortColumns},
    },
    models::reportes::{ReporteCreateDBRequest, ReporteDBResponse, ReporteUpdateDBRequest},
};
use crate::types::{ClienteId, ColoracionId, ReporteId};
use chrono::NaiveDate;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

const SELECT_JOINED: &str = r#"
    SELECT
        r.id, r.cliente_id, r.fecha_servicio, r.hora_servicio, r.coloracion_id,
        r.formula, r.observaciones, r.precio, r.created_at, r.updated_at,
        c.nombre AS cliente_nombre,
        c.email AS cliente_email,
        co.nombre AS coloracion_nombre,
        co.descripcion AS coloracion_descripcion
    FROM reportes r
    JOIN clientes c ON c.id = r.cliente_id
    JOIN coloraciones co ON co.id = r.coloracion_id"#;

const COUNT_JOINED: &str = r#"
    SELECT COUNT(*)
    FROM reportes r
    JOIN clientes c ON c.id = r.cliente_id
    JOIN coloraciones co ON co.id = r.coloracion_id"#;

const SORTABLE_COLUMNS: SortColumns = &[
    ("id", "r.id"),
    ("fechaServicio", "r.fecha_servicio"),
    ("horaServicio", "r.hora_servicio"),
    ("precio", "r.precio"),
    ("cliente", "c.nombre"),
    ("coloracion", "co.nombre"),
    ("createdAt", "r.created_at"),
];

const DEFAULT_ORDER: &str = "r.fecha_servicio DESC, r.hora_servicio DESC, r.id DESC";

/// Filter for listing reportes. Defaults to every row, most recent service first.
#[derive(Debug, Clone, Default)]
pub struct ReporteFilter {
    pub cliente_id: Option<ClienteId>,
    pub coloracion_id: Option<ColoracionId>,
    /// Inclusive lower bound on fecha_servicio
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on fecha_servicio
    pub to: Option<NaiveDate>,
    pub sort: Sort,
    pub skip: i64,
    pub limit: Option<i64>,
}

impl ReporteFilter {
    pub fn by_cliente(cliente_id: ClienteId) -> Self {
        Self {
            cliente_id: Some(cliente_id),
            ..Default::default()
        }
    }

    pub fn date_range(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(cliente_id) = self.cliente_id {
            query.push(" AND r.cliente_id = ").push_bind(cliente_id);
        }
        if let Some(coloracion_id) = self.coloracion_id {
            query.push(" AND r.coloracion_id = ").push_bind(coloracion_id);
        }
        if let Some(from) = self.from {
            query.push(" AND r.fecha_servicio >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            query.push(" AND r.fecha_servicio <= ").push_bind(to);
        }
    }

    fn list_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new(SELECT_JOINED);
        self.push_conditions(&mut query);
        self.sort.push_order_by(&mut query, SORTABLE_COLUMNS, DEFAULT_ORDER);
        if let Some(limit) = self.limit {
            query.push(" LIMIT ").push_bind(limit);
        }
        query.push(" OFFSET ").push_bind(self.skip);
        query
    }
}

pub struct Reportes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reportes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn fetch_joined(&mut self, id: ReporteId) -> Result<ReporteDBResponse> {
        let reporte = sqlx::query_as::<_, ReporteDBResponse>(&format!("{SELECT_JOINED} WHERE r.id = $1"))
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(reporte)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Reportes<'c> {
    type CreateRequest = ReporteCreateDBRequest;
    type UpdateRequest = ReporteUpdateDBRequest;
    type Response = ReporteDBResponse;
    type Id = ReporteId;
    type Filter = ReporteFilter;

    #[instrument(skip(self, request), fields(cliente_id = request.cliente_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: ReporteId = sqlx::query_scalar(
            r#"
            INSERT INTO reportes (cliente_id, fecha_servicio, hora_servicio, coloracion_id, formula, observaciones, precio)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(request.cliente_id)
        .bind(request.fecha_servicio)
        .bind(&request.hora_servicio)
        .bind(request.coloracion_id)
        .bind(&request.formula)
        .bind(&request.observaciones)
        .bind(request.precio)
        .fetch_one(&mut *self.db)
        .await?;

        self.fetch_joined(id).await
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        match self.fetch_joined(id).await {
            Ok(reporte) => Ok(Some(reporte)),
            Err(DbError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let reportes = sqlx::query_as::<_, ReporteDBResponse>(&format!("{SELECT_JOINED} WHERE r.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(reportes.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = filter.list_query();
        let reportes = query.build_query_as::<ReporteDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(reportes)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new(COUNT_JOINED);
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reportes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let id: ReporteId = sqlx::query_scalar(
            r#"
            UPDATE reportes SET
                cliente_id = COALESCE($2, cliente_id),
                fecha_servicio = COALESCE($3, fecha_servicio),
                hora_servicio = COALESCE($4, hora_servicio),
                coloracion_id = COALESCE($5, coloracion_id),
                formula = COALESCE($6, formula),
                observaciones = COALESCE($7, observaciones),
                precio = COALESCE($8, precio),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(request.cliente_id)
        .bind(request.fecha_servicio)
        .bind(&request.hora_servicio)
        .bind(request.coloracion_id)
        .bind(&request.formula)
        .bind(&request.observaciones)
        .bind(request.precio)
        .fetch_one(&mut *self.db)
        .await?;

        self.fetch_joined(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::reportes::DEFAULT_OBSERVACIONES;
    use crate::test_utils::{seed_cliente, seed_coloracion, seed_reporte};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn normalize(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_date_range_query() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let query = ReporteFilter::date_range(from, to).list_query();
        let sql = normalize(query.sql());
        assert!(sql.ends_with(
            "WHERE TRUE AND r.fecha_servicio >= $1 AND r.fecha_servicio <= $2 \
             ORDER BY r.fecha_servicio DESC, r.hora_servicio DESC, r.id DESC OFFSET $3"
        ));
    }

    #[test]
    fn test_sort_by_joined_column() {
        let filter = ReporteFilter {
            sort: Sort::new(Some("cliente".to_string()), Some("asc")),
            limit: Some(5),
            ..ReporteFilter::by_cliente(3)
        };
        let sql = normalize(filter.list_query().sql());
        assert!(sql.ends_with("WHERE TRUE AND r.cliente_id = $1 ORDER BY c.nombre ASC LIMIT $2 OFFSET $3"));
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[sqlx::test]
    async fn test_get_bulk_returns_joined_rows_and_skips_missing(pool: PgPool) {
        let maria = seed_cliente(&pool, "María López").await;
        let ceniza = seed_coloracion(&pool, "Rubio ceniza").await;
        let first = seed_reporte(&pool, maria.id, ceniza.id, day(1), Decimal::new(4550, 2)).await;
        let second = seed_reporte(&pool, maria.id, ceniza.id, day(2), Decimal::new(30, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        let bulk = Reportes::new(&mut conn)
            .get_bulk(vec![first.id, second.id, second.id + 1000])
            .await
            .unwrap();

        assert_eq!(bulk.len(), 2);
        let row = &bulk[&first.id];
        assert_eq!(row.cliente_nombre, "María López");
        assert_eq!(row.cliente_email, maria.email);
        assert_eq!(row.coloracion_nombre, "Rubio ceniza");
        assert_eq!(row.coloracion_descripcion, ceniza.descripcion);
        assert_eq!(row.precio, Decimal::new(4550, 2));
        assert_eq!(row.observaciones, DEFAULT_OBSERVACIONES);
        assert!(!bulk.contains_key(&(second.id + 1000)));
    }

    #[sqlx::test]
    async fn test_list_sorted_and_paginated(pool: PgPool) {
        let maria = seed_cliente(&pool, "María López").await;
        let lucia = seed_cliente(&pool, "Lucía Pérez").await;
        let ceniza = seed_coloracion(&pool, "Rubio ceniza").await;
        for (i, precio) in [20, 50, 35, 10].into_iter().enumerate() {
            seed_reporte(&pool, maria.id, ceniza.id, day(i as u32 + 1), Decimal::new(precio, 0)).await;
        }
        seed_reporte(&pool, lucia.id, ceniza.id, day(9), Decimal::new(99, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reportes::new(&mut conn);
        let filter = ReporteFilter {
            cliente_id: Some(maria.id),
            sort: Sort::new(Some("precio".to_string()), Some("desc")),
            skip: 1,
            limit: Some(2),
            ..Default::default()
        };

        let page = repo.list(&filter).await.unwrap();
        let precios: Vec<Decimal> = page.iter().map(|r| r.precio).collect();
        assert_eq!(precios, vec![Decimal::new(35, 0), Decimal::new(20, 0)]);
        assert_eq!(repo.count(&filter).await.unwrap(), 4);
    }

    #[sqlx::test]
    async fn test_date_range_is_inclusive_and_most_recent_first(pool: PgPool) {
        let maria = seed_cliente(&pool, "María López").await;
        let ceniza = seed_coloracion(&pool, "Rubio ceniza").await;
        for d in [1, 5, 10, 15] {
            seed_reporte(&pool, maria.id, ceniza.id, day(d), Decimal::new(40, 0)).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let found = Reportes::new(&mut conn)
            .list(&ReporteFilter::date_range(day(5), day(10)))
            .await
            .unwrap();

        let fechas: Vec<NaiveDate> = found.iter().map(|r| r.fecha_servicio).collect();
        assert_eq!(fechas, vec![day(10), day(5)]);
    }
}
