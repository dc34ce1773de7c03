//! API request/response models for service reports.

use super::validation::{self, MAX_TEXT_LENGTH};
use crate::db::models::reportes::{DEFAULT_OBSERVACIONES, ReporteCreateDBRequest, ReporteDBResponse, ReporteUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{ClienteId, ColoracionId, ReporteId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating or replacing a report.
///
/// `horaServicio` accepts `H:MM`, `HH:MM` or `HH:MM:SS` and is stored as `HH:MM:SS`.
/// `precio` accepts a JSON number or a decimal string.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReporteCreate {
    pub cliente_id: ClienteId,
    #[schema(value_type = String, format = Date, example = "2024-03-15")]
    pub fecha_servicio: NaiveDate,
    #[schema(example = "10:30")]
    pub hora_servicio: String,
    pub coloracion_id: ColoracionId,
    #[schema(example = "7.1 + 20 vol")]
    pub formula: String,
    /// Defaults to "Sin observaciones" when omitted or blank
    #[serde(default)]
    pub observaciones: Option<String>,
    #[schema(value_type = String, example = "45.50")]
    pub precio: Decimal,
}

pub type ReporteUpdate = ReporteCreate;

impl ReporteCreate {
    pub fn validate(self) -> Result<Self> {
        let observaciones = match self.observaciones.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_OBSERVACIONES.to_string(),
            Some(text) => validation::required_text("observaciones", text, MAX_TEXT_LENGTH)?,
        };

        if self.precio <= Decimal::ZERO {
            return Err(Error::validation("El precio debe ser mayor a 0"));
        }

        Ok(Self {
            cliente_id: validation::positive_id("clienteId", self.cliente_id)?,
            fecha_servicio: self.fecha_servicio,
            hora_servicio: normalize_hora(&self.hora_servicio)?,
            coloracion_id: validation::positive_id("coloracionId", self.coloracion_id)?,
            formula: validation::required_text("formula", &self.formula, MAX_TEXT_LENGTH).map_err(|_| Error::validation("La fórmula es requerida"))?,
            observaciones: Some(observaciones),
            precio: self.precio.round_dp(2),
        })
    }
}

/// Normalize a service time to `HH:MM:SS`. Hours may have one digit; minutes and seconds need two.
pub fn normalize_hora(input: &str) -> Result<String> {
    let invalid = || Error::validation("Hora inválida (formato HH:MM o HH:MM:SS)");

    let parts: Vec<&str> = input.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(invalid());
    }

    let field = |s: &str, min_len: usize, max: u32| -> Option<u32> {
        if s.len() < min_len || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok().filter(|v| *v <= max)
    };

    let hour = field(parts[0], 1, 23).ok_or_else(invalid)?;
    let minute = field(parts[1], 2, 59).ok_or_else(invalid)?;
    let second = match parts.get(2) {
        Some(s) => field(s, 2, 59).ok_or_else(invalid)?,
        None => 0,
    };

    Ok(format!("{hour:02}:{minute:02}:{second:02}"))
}

impl From<ReporteCreate> for ReporteCreateDBRequest {
    fn from(create: ReporteCreate) -> Self {
        Self {
            cliente_id: create.cliente_id,
            fecha_servicio: create.fecha_servicio,
            hora_servicio: create.hora_servicio,
            coloracion_id: create.coloracion_id,
            formula: create.formula,
            observaciones: create.observaciones.unwrap_or_else(|| DEFAULT_OBSERVACIONES.to_string()),
            precio: create.precio,
        }
    }
}

impl From<ReporteCreate> for ReporteUpdateDBRequest {
    fn from(update: ReporteCreate) -> Self {
        Self {
            cliente_id: Some(update.cliente_id),
            fecha_servicio: Some(update.fecha_servicio),
            hora_servicio: Some(update.hora_servicio),
            coloracion_id: Some(update.coloracion_id),
            formula: Some(update.formula),
            observaciones: update.observaciones,
            precio: Some(update.precio),
        }
    }
}

/// A report with the names of its cliente and coloracion
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReporteResponse {
    pub id: ReporteId,
    pub cliente_id: ClienteId,
    #[schema(value_type = String, format = Date)]
    pub fecha_servicio: NaiveDate,
    pub hora_servicio: String,
    pub coloracion_id: ColoracionId,
    pub formula: String,
    pub observaciones: String,
    #[schema(value_type = String, example = "45.50")]
    pub precio: Decimal,
    pub cliente_nombre: String,
    pub cliente_email: String,
    pub coloracion_nombre: String,
    pub coloracion_descripcion: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReporteDBResponse> for ReporteResponse {
    fn from(db: ReporteDBResponse) -> Self {
        Self {
            id: db.id,
            cliente_id: db.cliente_id,
            fecha_servicio: db.fecha_servicio,
            hora_servicio: db.hora_servicio,
            coloracion_id: db.coloracion_id,
            formula: db.formula,
            observaciones: db.observaciones,
            precio: db.precio,
            cliente_nombre: db.cliente_nombre,
            cliente_email: db.cliente_email,
            coloracion_nombre: db.coloracion_nombre,
            coloracion_descripcion: db.coloracion_descripcion,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Inclusive service-date range
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    #[param(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[param(value_type = String, format = Date)]
    pub end_date: NaiveDate,
}

impl DateRangeQuery {
    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(Error::validation("La fecha de inicio debe ser anterior o igual a la fecha de fin"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ReporteCreate {
        ReporteCreate {
            cliente_id: 1,
            fecha_servicio: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            hora_servicio: "9:05".to_string(),
            coloracion_id: 2,
            formula: "7.1 + 20 vol".to_string(),
            observaciones: None,
            precio: Decimal::new(4550, 2),
        }
    }

    #[test]
    fn test_normalize_hora() {
        assert_eq!(normalize_hora("9:05").unwrap(), "09:05:00");
        assert_eq!(normalize_hora("23:59:59").unwrap(), "23:59:59");
        assert_eq!(normalize_hora("00:00").unwrap(), "00:00:00");

        for bad in ["24:00", "12:60", "12:5", "12", "12:30:60", "aa:bb", "12:30:00:00", "", "123:00"] {
            assert!(normalize_hora(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_validate_defaults_observaciones() {
        let validated = request().validate().unwrap();
        assert_eq!(validated.hora_servicio, "09:05:00");
        assert_eq!(validated.observaciones.as_deref(), Some(DEFAULT_OBSERVACIONES));

        let blank = ReporteCreate {
            observaciones: Some("   ".to_string()),
            ..request()
        };
        assert_eq!(blank.validate().unwrap().observaciones.as_deref(), Some(DEFAULT_OBSERVACIONES));
    }

    #[test]
    fn test_validate_rejects_non_positive_price() {
        for precio in [Decimal::ZERO, Decimal::new(-1, 0)] {
            let err = ReporteCreate { precio, ..request() }.validate().unwrap_err();
            assert!(matches!(err, Error::Validation { ref message } if message == "El precio debe ser mayor a 0"));
        }
    }

    #[test]
    fn test_validate_requires_formula() {
        let err = ReporteCreate {
            formula: " ".to_string(),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, Error::Validation { ref message } if message == "La fórmula es requerida"));
    }

    #[test]
    fn test_price_accepts_number_or_string() {
        let json = r#"{"clienteId":1,"fechaServicio":"2024-03-15","horaServicio":"10:30","coloracionId":2,"formula":"x","precio":45.5}"#;
        let parsed: ReporteCreate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.precio, Decimal::new(455, 1));

        let json = r#"{"clienteId":1,"fechaServicio":"2024-03-15","horaServicio":"10:30","coloracionId":2,"formula":"x","precio":"45.50"}"#;
        let parsed: ReporteCreate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.precio, Decimal::new(4550, 2));
    }

    #[test]
    fn test_date_range_order() {
        let range = DateRangeQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        };
        assert!(range.validate().is_err());
    }
}
