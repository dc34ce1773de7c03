//! # colorlab: REST API for a hair-coloring studio
//!
//! `colorlab` keeps the records of a coloring studio: its customers (*clientes*), the coloring
//! formulas it offers (*coloraciones*), one report per service performed (*reportes*) and the
//! photos attached to each report (*fotos-reportes*). Selected reports can be exported as a PDF
//! or CSV document.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Every route under `/api` except register, login, refresh
//! and logout requires a Bearer access token.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the handlers and their request/response models. Every JSON
//! response uses the same envelope, `{ code, error, message, technicalMessage?, data? }`.
//!
//! The **authentication layer** ([`auth`]) issues short-lived access tokens and single-use refresh
//! tokens. Refresh tokens are stored hashed, rotated on every refresh and revoked on logout.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Each entity has a repository over
//! a borrowed connection, so handlers can compose several of them inside one transaction.
//!
//! The **document layer** ([`documents`]) joins reports with their photos and renders them as a
//! PDF (with embedded photos) or a CSV (with photo links).
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use colorlab::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = colorlab::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     colorlab::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post, put},
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers,
    auth::{
        service::AuthService,
        stores::{PgCredentialStore, PgRefreshTokenStore},
    },
    documents::{
        DocumentRenderer,
        aggregator::{PgReportSource, ReportSource},
    },
    openapi::ApiDoc,
};
pub use config::Config;

/// Upper bound on JSON request bodies.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers.
///
/// - `db`: PostgreSQL connection pool used by the repositories
/// - `config`: Application configuration loaded from file and environment
/// - `auth`: Token issuing and verification, backed by the user and refresh token stores
/// - `reports`: Where the document generator reads reports and photos from
/// - `documents`: PDF/CSV renderer configured from `config.documents`
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .auth(auth)
///     .reports(reports)
///     .documents(renderer)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub auth: AuthService,
    pub reports: Arc<dyn ReportSource>,
    pub documents: DocumentRenderer,
}

/// Get the colorlab database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

#[instrument(skip_all)]
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        origins.push(origin.header_value().parse::<HeaderValue>()?);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION, http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/api/*`: the JSON API
/// - `/images/*`: report photos straight from `documents.images_dir`
/// - `/healthz`: liveness probe
/// - `/docs`: Scalar UI over the OpenAPI document
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/logout-all", post(handlers::auth::logout_all));

    let user_routes = Router::new()
        .route("/user", post(handlers::users::create_user))
        .route("/user/search", get(handlers::users::search_users))
        .route("/user/get-user-by-id/{id}", get(handlers::users::get_user_by_id))
        .route("/user/get-user-by-email/{email}", get(handlers::users::get_user_by_email))
        .route("/user/update-user", put(handlers::users::update_user));

    let resource_routes = Router::new()
        // Clientes
        .route(
            "/clientes",
            get(handlers::clientes::list_clientes).post(handlers::clientes::create_cliente),
        )
        .route("/clientes/search", get(handlers::clientes::search_clientes))
        .route("/clientes/paginated", get(handlers::clientes::paginate_clientes))
        .route(
            "/clientes/{id}",
            get(handlers::clientes::get_cliente)
                .put(handlers::clientes::update_cliente)
                .delete(handlers::clientes::delete_cliente),
        )
        // Coloraciones
        .route(
            "/coloraciones",
            get(handlers::coloraciones::list_coloraciones).post(handlers::coloraciones::create_coloracion),
        )
        .route("/coloraciones/search", get(handlers::coloraciones::search_coloraciones))
        .route(
            "/coloraciones/{id}",
            get(handlers::coloraciones::get_coloracion)
                .put(handlers::coloraciones::update_coloracion)
                .delete(handlers::coloraciones::delete_coloracion),
        )
        // Reportes
        .route(
            "/reportes",
            get(handlers::reportes::list_reportes).post(handlers::reportes::create_reporte),
        )
        .route("/reportes/date-range", get(handlers::reportes::get_reportes_by_date_range))
        .route("/reportes/cliente/{cliente_id}", get(handlers::reportes::get_reportes_by_cliente))
        .route("/reportes/generar-documento", post(handlers::reportes::generar_documento))
        .route(
            "/reportes/{id}",
            get(handlers::reportes::get_reporte)
                .put(handlers::reportes::update_reporte)
                .delete(handlers::reportes::delete_reporte),
        )
        // Fotos de reportes
        .route(
            "/fotos-reportes",
            get(handlers::fotos_reportes::list_fotos).post(handlers::fotos_reportes::create_foto),
        )
        .route(
            "/fotos-reportes/reporte/{reporte_id}",
            get(handlers::fotos_reportes::get_fotos_by_reporte).delete(handlers::fotos_reportes::delete_fotos_by_reporte),
        )
        .route(
            "/fotos-reportes/{id}",
            get(handlers::fotos_reportes::get_foto)
                .put(handlers::fotos_reportes::update_foto)
                .delete(handlers::fotos_reportes::delete_foto),
        );

    let images_dir = state.config.documents.images_dir.clone();
    let cors = create_cors_layer(&state.config)?;

    let api_routes = auth_routes.merge(user_routes).merge(resource_routes).with_state(state);

    let router = Router::new()
        .nest("/api", api_routes)
        .nest_service("/images", ServeDir::new(images_dir))
        .route("/healthz", get(|| async { "OK" }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        );

    Ok(router)
}

/// Connect to Postgres, apply migrations and seed the admin user.
#[instrument(skip_all)]
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("database_url is not configured. Set DATABASE_URL or add database_url to the config file."))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;
    migrator().run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting colorlab with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;

        let auth = AuthService::new(
            &config,
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgRefreshTokenStore::new(pool.clone())),
        )?;

        match config.admin_password.as_deref() {
            Some(password) => {
                auth.seed_admin(&config.admin_email, password, &config.admin_name)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;
            }
            None => warn!("admin_password is not set, skipping admin user seeding"),
        }

        auth.purge_expired_tokens().await?;

        if let Err(e) = tokio::fs::create_dir_all(&config.documents.images_dir).await {
            warn!(
                images_dir = %config.documents.images_dir.display(),
                "Could not create images directory: {e}"
            );
        }

        let app_state = AppState::builder()
            .db(pool.clone())
            .documents(DocumentRenderer::new(&config.documents))
            .reports(Arc::new(PgReportSource::new(pool.clone())) as Arc<dyn ReportSource>)
            .auth(auth)
            .config(config.clone())
            .build();

        let router = build_router(app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Colorlab listening on http://{}, docs at http://localhost:{}/docs",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_healthz() {
        let app = create_test_app();

        let response = app.server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn test_docs_are_served() {
        let app = create_test_app();

        app.server.get("/docs").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_test_app();

        app.server.get("/api/nope").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_image_is_404() {
        let app = create_test_app();

        app.server.get("/images/missing.jpg").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let app = create_test_app();

        let response = app
            .server
            .method(axum::http::Method::OPTIONS, "/api/clientes")
            .add_header("origin", "http://localhost:3000")
            .add_header("access-control-request-method", "GET")
            .await;

        assert_eq!(
            response.header("access-control-allow-origin").to_str().unwrap(),
            "http://localhost:3000"
        );
    }
}
