//! Database models for clientes.

use crate::types::ClienteId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ClienteCreateDBRequest {
    pub nombre: String,
    pub email: String,
    pub telefono: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClienteUpdateDBRequest {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClienteDBResponse {
    pub id: ClienteId,
    pub nombre: String,
    pub email: String,
    pub telefono: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
