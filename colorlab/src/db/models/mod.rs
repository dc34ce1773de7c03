//! Database record models matching table schemas.
//!
//! Each struct here corresponds to a table row (deriving `sqlx::FromRow`) or to the data a
//! repository needs to insert or update one. They are kept separate from the API models in
//! [`crate::api::models`] so storage and wire representations can evolve independently.
//!
//! - [`users`]: User accounts and password hashes
//! - [`refresh_tokens`]: Hashed refresh tokens used for session revocation
//! - [`clientes`]: Customers
//! - [`coloraciones`]: Coloring formulas offered by the studio
//! - [`reportes`]: Service reports, joined with cliente and coloracion names
//! - [`fotos_reportes`]: Photo metadata attached to reports

pub mod clientes;
pub mod coloraciones;
pub mod fotos_reportes;
pub mod refresh_tokens;
pub mod reportes;
pub mod users;
