//! API request/response models for clientes.

use super::pagination::PageParams;
use super::validation::{self, MAX_TEXT_LENGTH};
use crate::db::models::clientes::{ClienteCreateDBRequest, ClienteDBResponse, ClienteUpdateDBRequest};
use crate::errors::Result;
use crate::types::ClienteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating a cliente. Updates take the same shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClienteCreate {
    #[schema(example = "María López")]
    pub nombre: String,
    #[schema(example = "maria@example.com")]
    pub email: String,
    #[schema(example = "+56 9 1234 5678")]
    pub telefono: String,
}

pub type ClienteUpdate = ClienteCreate;

impl ClienteCreate {
    pub fn validate(self) -> Result<Self> {
        Ok(Self {
            nombre: validation::required_text("nombre", &self.nombre, MAX_TEXT_LENGTH)?,
            email: validation::email("email", &self.email)?,
            telefono: validation::required_text("telefono", &self.telefono, MAX_TEXT_LENGTH)?,
        })
    }
}

impl From<ClienteCreate> for ClienteCreateDBRequest {
    fn from(create: ClienteCreate) -> Self {
        Self {
            nombre: create.nombre,
            email: create.email,
            telefono: create.telefono,
        }
    }
}

impl From<ClienteCreate> for ClienteUpdateDBRequest {
    fn from(update: ClienteCreate) -> Self {
        Self {
            nombre: Some(update.nombre),
            email: Some(update.email),
            telefono: Some(update.telefono),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClienteResponse {
    pub id: ClienteId,
    pub nombre: String,
    pub email: String,
    pub telefono: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClienteDBResponse> for ClienteResponse {
    fn from(db: ClienteDBResponse) -> Self {
        Self {
            id: db.id,
            nombre: db.nombre,
            email: db.email,
            telefono: db.telefono,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Free-text search over nombre, email and telefono
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ClienteSearchQuery {
    pub q: Option<String>,
}

/// Paginated search with per-field filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ClientePageQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PageParams,

    pub nombre: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
}
