//! API request/response models for coloraciones.

use super::validation::{self, MAX_TEXT_LENGTH};
use crate::db::models::coloraciones::{ColoracionCreateDBRequest, ColoracionDBResponse, ColoracionUpdateDBRequest};
use crate::errors::Result;
use crate::types::ColoracionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating or replacing a coloracion
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ColoracionCreate {
    #[schema(example = "Rubio ceniza")]
    pub nombre: String,
    #[schema(example = "Tono 7.1 con oxidante de 20 volúmenes")]
    pub descripcion: String,
}

pub type ColoracionUpdate = ColoracionCreate;

impl ColoracionCreate {
    pub fn validate(self) -> Result<Self> {
        Ok(Self {
            nombre: validation::required_text("nombre", &self.nombre, MAX_TEXT_LENGTH)?,
            descripcion: validation::required_text("descripcion", &self.descripcion, MAX_TEXT_LENGTH)?,
        })
    }
}

impl From<ColoracionCreate> for ColoracionCreateDBRequest {
    fn from(create: ColoracionCreate) -> Self {
        Self {
            nombre: create.nombre,
            descripcion: create.descripcion,
        }
    }
}

impl From<ColoracionCreate> for ColoracionUpdateDBRequest {
    fn from(update: ColoracionCreate) -> Self {
        Self {
            nombre: Some(update.nombre),
            descripcion: Some(update.descripcion),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColoracionResponse {
    pub id: ColoracionId,
    pub nombre: String,
    pub descripcion: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ColoracionDBResponse> for ColoracionResponse {
    fn from(db: ColoracionDBResponse) -> Self {
        Self {
            id: db.id,
            nombre: db.nombre,
            descripcion: db.descripcion,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Free-text search over nombre and descripcion
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ColoracionSearchQuery {
    pub q: Option<String>,
}
