//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `&mut PgConnection` (from the pool or a transaction),
//! handles query construction and parameter binding, and returns the row types from
//! [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts and credentials
//! - [`RefreshTokens`]: Hashed refresh tokens (not a [`Repository`]: rows are only created and consumed)
//! - [`Clientes`]: Customers
//! - [`Coloraciones`]: Coloring formulas
//! - [`Reportes`]: Service reports joined with their cliente and coloracion
//! - [`FotosReportes`]: Photo metadata for reports
//!
//! # Common Pattern
//!
//! ```ignore
//! use colorlab::db::handlers::{Reportes, Repository, reportes::ReporteFilter};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Reportes::new(&mut conn);
//!     let reportes = repo.list(&ReporteFilter::by_cliente(1)).await?;
//!     Ok(())
//! }
//! ```

pub mod clientes;
pub mod coloraciones;
pub mod fotos_reportes;
pub mod refresh_tokens;
pub mod reportes;
pub mod repository;
pub mod sorting;
pub mod users;

pub use clientes::Clientes;
pub use coloraciones::Coloraciones;
pub use fotos_reportes::FotosReportes;
pub use refresh_tokens::RefreshTokens;
pub use reportes::Reportes;
pub use repository::Repository;
pub use users::Users;
