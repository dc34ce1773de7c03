//! Database repository for clientes.

use std::collections::HashMap;

use crate::db::{
    errors::Result,
    handlers::{
        repository::Repository,
        sorting::{Sort, SortColumns},
    },
    models::clientes::{ClienteCreateDBRequest, ClienteDBResponse, ClienteUpdateDBRequest},
};
use crate::types::ClienteId;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

const SORTABLE_COLUMNS: SortColumns = &[
    ("id", "id"),
    ("nombre", "nombre"),
    ("email", "email"),
    ("telefono", "telefono"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

/// Filter for listing clientes
#[derive(Debug, Clone, Default)]
pub struct ClienteFilter {
    /// Free text matched against nombre, email and telefono
    pub search: Option<String>,
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub sort: Sort,
    pub skip: i64,
    /// `None` returns every matching row
    pub limit: Option<i64>,
}

impl ClienteFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit: Some(limit),
            ..Default::default()
        }
    }

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
                .push(" OR email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR telefono ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        for (column, value) in [("nombre", &self.nombre), ("email", &self.email), ("telefono", &self.telefono)] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                query.push(format!(" AND {column} ILIKE ")).push_bind(format!("%{value}%"));
            }
        }
    }

    fn list_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new("SELECT * FROM clientes");
        self.push_conditions(&mut query);
        self.sort.push_order_by(&mut query, SORTABLE_COLUMNS, "id ASC");
        if let Some(limit) = self.limit {
            query.push(" LIMIT ").push_bind(limit);
        }
        query.push(" OFFSET ").push_bind(self.skip);
        query
    }
}

pub struct Clientes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Clientes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Clientes<'c> {
    type CreateRequest = ClienteCreateDBRequest;
    type UpdateRequest = ClienteUpdateDBRequest;
    type Response = ClienteDBResponse;
    type Id = ClienteId;
    type Filter = ClienteFilter;

    #[instrument(skip(self, request), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let cliente = sqlx::query_as::<_, ClienteDBResponse>(
            r#"
            INSERT INTO clientes (nombre, email, telefono)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&request.nombre)
        .bind(&request.email)
        .bind(&request.telefono)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(cliente)
    }

    #[instrument(skip(self), fields(cliente_id = id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let cliente = sqlx::query_as::<_, ClienteDBResponse>("SELECT * FROM clientes WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(cliente)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let clientes = sqlx::query_as::<_, ClienteDBResponse>("SELECT * FROM clientes WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(clientes.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = filter.list_query();
        let clientes = query.build_query_as::<ClienteDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(clientes)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM clientes");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(cliente_id = id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clientes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(cliente_id = id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let cliente = sqlx::query_as::<_, ClienteDBResponse>(
            r#"
            UPDATE clientes SET
                nombre = COALESCE($2, nombre),
                email = COALESCE($3, email),
                telefono = COALESCE($4, telefono),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.nombre)
        .bind(&request.email)
        .bind(&request.telefono)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(cliente)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::seed_cliente;
    use sqlx::PgPool;

    #[test]
    fn test_list_query_binds_search_terms() {
        let filter = ClienteFilter {
            search: Some("ana".to_string()),
            email: Some("gmail".to_string()),
            ..ClienteFilter::new(20, 10)
        };
        let query = filter.list_query();
        assert_eq!(
            query.sql(),
            "SELECT * FROM clientes WHERE TRUE AND (nombre ILIKE $1 OR email ILIKE $2 OR telefono ILIKE $3) \
             AND email ILIKE $4 ORDER BY id ASC LIMIT $5 OFFSET $6"
        );
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let filter = ClienteFilter {
            nombre: Some("   ".to_string()),
            sort: Sort::new(Some("nombre".to_string()), Some("desc")),
            ..Default::default()
        };
        let query = filter.list_query();
        assert_eq!(query.sql(), "SELECT * FROM clientes WHERE TRUE ORDER BY nombre DESC OFFSET $1");
    }

    #[sqlx::test]
    async fn test_list_sorted_by_nombre_with_pagination(pool: PgPool) {
        for nombre in ["Carmen", "Ana", "Elena", "Beatriz", "Dolores"] {
            seed_cliente(&pool, nombre).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Clientes::new(&mut conn);
        let filter = ClienteFilter {
            sort: Sort::new(Some("nombre".to_string()), Some("DESC")),
            ..ClienteFilter::new(1, 2)
        };

        let page = repo.list(&filter).await.unwrap();
        let nombres: Vec<&str> = page.iter().map(|c| c.nombre.as_str()).collect();
        assert_eq!(nombres, vec!["Dolores", "Carmen"]);
        assert_eq!(repo.count(&filter).await.unwrap(), 5);

        // Unknown sort fields fall back to id order
        let fallback = ClienteFilter {
            sort: Sort::new(Some("password".to_string()), None),
            ..Default::default()
        };
        let all = repo.list(&fallback).await.unwrap();
        assert_eq!(all.first().map(|c| c.nombre.as_str()), Some("Carmen"));
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[sqlx::test]
    async fn test_search_matches_any_contact_field(pool: PgPool) {
        seed_cliente(&pool, "Ana Ruiz").await;
        seed_cliente(&pool, "Beatriz Gil").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Clientes::new(&mut conn);

        let by_email = repo.list(&ClienteFilter::search("beatriz.gil@")).await.unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].nombre, "Beatriz Gil");
        assert_eq!(repo.count(&ClienteFilter::search("600000000")).await.unwrap(), 2);
    }
}
