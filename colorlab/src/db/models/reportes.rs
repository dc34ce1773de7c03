//! Database models for reportes.

use crate::types::{ClienteId, ColoracionId, ReporteId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Observaciones stored when the caller leaves them empty
pub const DEFAULT_OBSERVACIONES: &str = "Sin observaciones";

#[derive(Debug, Clone)]
pub struct ReporteCreateDBRequest {
    pub cliente_id: ClienteId,
    pub fecha_servicio: NaiveDate,
    pub hora_servicio: String,
    pub coloracion_id: ColoracionId,
    pub formula: String,
    pub observaciones: String,
    pub precio: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct ReporteUpdateDBRequest {
    pub cliente_id: Option<ClienteId>,
    pub fecha_servicio: Option<NaiveDate>,
    pub hora_servicio: Option<String>,
    pub coloracion_id: Option<ColoracionId>,
    pub formula: Option<String>,
    pub observaciones: Option<String>,
    pub precio: Option<Decimal>,
}

/// A report row joined with the names of its cliente and coloracion.
#[derive(Debug, Clone, FromRow)]
pub struct ReporteDBResponse {
    pub id: ReporteId,
    pub cliente_id: ClienteId,
    pub fecha_servicio: NaiveDate,
    pub hora_servicio: String,
    pub coloracion_id: ColoracionId,
    pub formula: String,
    pub observaciones: String,
    pub precio: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cliente_nombre: String,
    pub cliente_email: String,
    pub coloracion_nombre: String,
    pub coloracion_descripcion: String,
}
