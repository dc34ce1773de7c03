//! Database repository for coloraciones.

use std::collections::HashMap;

use crate::db::{
    errors::Result,
    handlers::{
        repository::Repository,
        sorting::{Sort, SortColumns},
    },
    models::coloraciones::{ColoracionCreateDBRequest, ColoracionDBResponse, ColoracionUpdateDBRequest},
};
use crate::types::ColoracionId;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

const SORTABLE_COLUMNS: SortColumns = &[
    ("id", "id"),
    ("nombre", "nombre"),
    ("descripcion", "descripcion"),
    ("createdAt", "created_at"),
];

/// Filter for listing coloraciones. Defaults to every row ordered by nombre.
#[derive(Debug, Clone, Default)]
pub struct ColoracionFilter {
    /// Free text matched against nombre and descripcion
    pub search: Option<String>,
    pub sort: Sort,
    pub skip: i64,
    pub limit: Option<i64>,
}

impl ColoracionFilter {
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            search: Some(query.into()),
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            query
                .push(" AND (nombre ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR descripcion ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    fn list_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new("SELECT * FROM coloraciones");
        self.push_conditions(&mut query);
        self.sort.push_order_by(&mut query, SORTABLE_COLUMNS, "nombre ASC, id ASC");
        if let Some(limit) = self.limit {
            query.push(" LIMIT ").push_bind(limit);
        }
        query.push(" OFFSET ").push_bind(self.skip);
        query
    }
}

pub struct Coloraciones<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Coloraciones<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Coloraciones<'c> {
    type CreateRequest = ColoracionCreateDBRequest;
    type UpdateRequest = ColoracionUpdateDBRequest;
    type Response = ColoracionDBResponse;
    type Id = ColoracionId;
    type Filter = ColoracionFilter;

    #[instrument(skip(self, request), fields(nombre = %request.nombre), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let coloracion = sqlx::query_as::<_, ColoracionDBResponse>(
            "INSERT INTO coloraciones (nombre, descripcion) VALUES ($1, $2) RETURNING *",
        )
        .bind(&request.nombre)
        .bind(&request.descripcion)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(coloracion)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let coloracion = sqlx::query_as::<_, ColoracionDBResponse>("SELECT * FROM coloraciones WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(coloracion)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let coloraciones = sqlx::query_as::<_, ColoracionDBResponse>("SELECT * FROM coloraciones WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(coloraciones.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = filter.list_query();
        let coloraciones = query.build_query_as::<ColoracionDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(coloraciones)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM coloraciones");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM coloraciones WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let coloracion = sqlx::query_as::<_, ColoracionDBResponse>(
            r#"
            UPDATE coloraciones SET
                nombre = COALESCE($2, nombre),
                descripcion = COALESCE($3, descripcion),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.nombre)
        .bind(&request.descripcion)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(coloracion)
    }
}
