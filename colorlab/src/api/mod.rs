//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything lives under `/api`:
//!
//! - **Auth** (`/api/auth/*`): Register, login, refresh, logout and logout-all
//! - **Users** (`/api/user/*`): Lookup, self-service update, admin create and search
//! - **Clientes** (`/api/clientes/*`): Customers
//! - **Coloraciones** (`/api/coloraciones/*`): Coloring formulas
//! - **Reportes** (`/api/reportes/*`): Service reports and PDF/CSV generation
//! - **Fotos** (`/api/fotos-reportes/*`): Photo metadata; files are served from `/images/*`
//!
//! # OpenAPI Documentation
//!
//! All endpoints are annotated with `utoipa`. Interactive documentation is served at `/docs`.

pub mod handlers;
pub mod models;
