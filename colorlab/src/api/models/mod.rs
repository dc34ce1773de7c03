//! API request and response data models.
//!
//! These structures define the public JSON contract. They are distinct from the database
//! models in [`crate::db::models`], carry `utoipa` annotations for the OpenAPI document, and
//! validate their own input through `validate` methods that return [`crate::errors::Error::Validation`].
//!
//! Every JSON response is wrapped in [`envelope::ApiMessage`].
//!
//! - [`auth`]: Registration, login, refresh and logout payloads
//! - [`users`]: User profiles and admin user management
//! - [`clientes`], [`coloraciones`], [`reportes`], [`fotos_reportes`]: Business resources
//! - [`documents`]: PDF/CSV generation requests
//! - [`pagination`]: Page parameters and paginated responses

pub mod auth;
pub mod clientes;
pub mod coloraciones;
pub mod documents;
pub mod envelope;
pub mod fotos_reportes;
pub mod pagination;
pub mod reportes;
pub mod users;
pub mod validation;
