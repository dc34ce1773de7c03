//! Database models for coloraciones.

use crate::types::ColoracionId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ColoracionCreateDBRequest {
    pub nombre: String,
    pub descripcion: String,
}

#[derive(Debug, Clone, Default)]
pub struct ColoracionUpdateDBRequest {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ColoracionDBResponse {
    pub id: ColoracionId,
    pub nombre: String,
    pub descripcion: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
