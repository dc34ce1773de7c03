//! HTTP request handlers for all API endpoints.
//!
//! Handlers are Axum functions organized by resource. Each one:
//! - validates and deserializes the request
//! - requires a Bearer access token by taking a [`crate::api::models::users::CurrentUser`]
//!   argument (everything except register, login, refresh and logout)
//! - runs the operation through a repository or [`crate::auth::service::AuthService`]
//! - wraps the result in [`crate::api::models::envelope::ApiMessage`]
//!
//! Errors are [`crate::errors::Error`], which renders the same envelope with `error: true`.
//!
//! - [`auth`]: Register, login, refresh rotation and logout
//! - [`users`]: User lookup, self-service update and admin user management
//! - [`clientes`]: Customer CRUD and search
//! - [`coloraciones`]: Coloring formula CRUD and search
//! - [`reportes`]: Service report CRUD, queries and PDF/CSV generation
//! - [`fotos_reportes`]: Photo metadata attached to reports

pub mod auth;
pub mod clientes;
pub mod coloraciones;
pub mod fotos_reportes;
pub mod reportes;
pub mod users;
