//! Test utilities (available with the `test-utils` feature).
//!
//! Everything here runs without a database: auth goes through in-memory credential and refresh
//! token stores, document generation through an in-memory report source, and the pool in
//! [`AppState`] is lazy so it only fails if a handler actually touches Postgres.
//!
//! The lazy pool spawns its maintenance task on creation, so [`create_test_state`] and
//! [`create_test_app`] must be called from inside a Tokio runtime.
//!
//! The `seed_*` helpers are the exception: they insert rows through the repositories and are
//! meant for `#[sqlx::test]` tests, which hand each test a freshly migrated database.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    AppState,
    auth::{
        service::AuthService,
        stores::{ConsumeOutcome, CredentialStore, RefreshTokenStore},
        tokens::{TokenPayload, hash_token},
    },
    config::Config,
    db::{
        errors::DbError,
        handlers::{Clientes, Coloraciones, FotosReportes, Reportes, Repository, Users},
        models::{
            clientes::{ClienteCreateDBRequest, ClienteDBResponse},
            coloraciones::{ColoracionCreateDBRequest, ColoracionDBResponse},
            fotos_reportes::{FotoReporteCreateDBRequest, FotoReporteDBResponse},
            refresh_tokens::RefreshToken,
            reportes::{DEFAULT_OBSERVACIONES, ReporteCreateDBRequest, ReporteDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    documents::{
        DocumentRenderer,
        aggregator::ReportSource,
    },
    errors::{Error, Result},
    types::{ClienteId, ColoracionId, ROLE_USER, ReporteId, RoleId, UserId},
};

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: Some("postgres://localhost/colorlab_test".to_string()),
        database_max_connections: 1,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        admin_email: "admin@test.com".to_string(),
        ..Default::default()
    };

    // Fast hashing for tests
    config.auth.password.argon2_memory_kib = 8;
    config.auth.password.argon2_iterations = 1;
    config.auth.password.argon2_parallelism = 1;

    config.documents.images_dir = std::env::temp_dir().join(format!("colorlab-test-images-{}", std::process::id()));
    config
}

/// Users held in a vector, with the same unique-email rule as the `users` table.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<Vec<UserDBResponse>>,
    next_id: AtomicI64,
}

impl InMemoryCredentialStore {
    /// Drop a user, as if deleted behind the service's back
    pub fn remove(&self, id: UserId) {
        self.users.lock().unwrap().retain(|u| u.id != id);
    }

    fn duplicate_email() -> Error {
        Error::Database(DbError::UniqueViolation {
            constraint: Some("users_email_unique".to_string()),
            table: Some("users".to_string()),
            message: "duplicate key value violates unique constraint \"users_email_unique\"".to_string(),
        })
    }

    fn modify(&self, id: UserId, apply: impl FnOnce(&mut UserDBResponse)) -> Result<UserDBResponse> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == id).ok_or_else(|| Error::not_found("Usuario", id))?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, request: UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == request.email) {
            return Err(Self::duplicate_email());
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            email: request.email,
            password_hash: request.password_hash,
            name: request.name,
            role_id: request.role_id,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: UserId, email: Option<String>, name: Option<String>) -> Result<UserDBResponse> {
        if let Some(email) = &email {
            let taken = self.users.lock().unwrap().iter().any(|u| &u.email == email && u.id != id);
            if taken {
                return Err(Self::duplicate_email());
            }
        }

        self.modify(id, |user| {
            if let Some(email) = email {
                user.email = email;
            }
            if let Some(name) = name {
                user.name = Some(name);
            }
        })
    }

    async fn update_password(&self, id: UserId, password_hash: String) -> Result<UserDBResponse> {
        self.modify(id, |user| user.password_hash = password_hash)
    }
}

/// Refresh tokens held in a vector. Only hashes are kept, as in the real table.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: Mutex<Vec<RefreshToken>>,
    next_id: AtomicI64,
}

impl InMemoryRefreshTokenStore {
    pub fn count_for(&self, user_id: UserId) -> usize {
        self.tokens.lock().unwrap().iter().filter(|t| t.user_id == user_id).count()
    }

    pub fn tokens_for(&self, user_id: UserId) -> Vec<RefreshToken> {
        self.tokens.lock().unwrap().iter().filter(|t| t.user_id == user_id).cloned().collect()
    }

    fn take(&self, user_id: UserId, raw_token: &str) -> Option<RefreshToken> {
        let hash = hash_token(raw_token);
        let mut tokens = self.tokens.lock().unwrap();
        let index = tokens.iter().position(|t| t.user_id == user_id && t.token_hash == hash)?;
        Some(tokens.remove(index))
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn store(&self, user_id: UserId, raw_token: &str, expires_at: DateTime<Utc>) -> Result<RefreshToken> {
        let token = RefreshToken {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id,
            token_hash: hash_token(raw_token),
            expires_at,
            created_at: Utc::now(),
        };
        self.tokens.lock().unwrap().push(token.clone());
        Ok(token)
    }

    async fn consume(&self, user_id: UserId, raw_token: &str) -> Result<ConsumeOutcome> {
        Ok(ConsumeOutcome::from_taken(self.take(user_id, raw_token), Utc::now()))
    }

    async fn revoke_one(&self, user_id: UserId, raw_token: &str) -> Result<bool> {
        Ok(self.take(user_id, raw_token).is_some())
    }

    async fn revoke_all(&self, user_id: UserId) -> Result<u64> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| !t.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}

/// Reports and photos keyed by report id
#[derive(Default)]
pub struct InMemoryReportSource {
    entries: Mutex<HashMap<ReporteId, (ReporteDBResponse, Vec<FotoReporteDBResponse>)>>,
}

impl InMemoryReportSource {
    pub fn insert(&self, reporte: ReporteDBResponse, fotos: Vec<FotoReporteDBResponse>) {
        self.entries.lock().unwrap().insert(reporte.id, (reporte, fotos));
    }
}

#[async_trait]
impl ReportSource for InMemoryReportSource {
    async fn reportes(&self, ids: &[ReporteId]) -> Result<HashMap<ReporteId, ReporteDBResponse>> {
        let entries = self.entries.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| entries.get(id).map(|(reporte, _)| (*id, reporte.clone())))
            .collect())
    }

    async fn fotos(&self, ids: &[ReporteId]) -> Result<HashMap<ReporteId, Vec<FotoReporteDBResponse>>> {
        let entries = self.entries.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| entries.get(id).map(|(_, fotos)| (*id, fotos.clone())))
            .collect())
    }
}

fn fixed_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 10, 45, 0).unwrap()
}

/// A joined report for María López on 2024-03-15 at 10:30, priced 45.50
pub fn sample_reporte(id: ReporteId) -> ReporteDBResponse {
    ReporteDBResponse {
        id,
        cliente_id: 1,
        fecha_servicio: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        hora_servicio: "10:30:00".to_string(),
        coloracion_id: 1,
        formula: "7.1 + 20 vol".to_string(),
        observaciones: DEFAULT_OBSERVACIONES.to_string(),
        precio: Decimal::new(4550, 2),
        created_at: fixed_timestamp(),
        updated_at: fixed_timestamp(),
        cliente_nombre: "María López".to_string(),
        cliente_email: "maria@example.com".to_string(),
        coloracion_nombre: "Rubio ceniza".to_string(),
        coloracion_descripcion: "Tono 7.1 con oxidante de 20 volúmenes".to_string(),
    }
}

pub fn sample_foto(id: i64, reporte_id: ReporteId, filename: &str) -> FotoReporteDBResponse {
    FotoReporteDBResponse {
        id,
        reporte_id,
        filename: filename.to_string(),
        created_at: fixed_timestamp(),
        updated_at: fixed_timestamp(),
    }
}

/// Auth service over fresh in-memory stores, returned alongside them for inspection
pub fn create_test_auth_service() -> (AuthService, Arc<InMemoryCredentialStore>, Arc<InMemoryRefreshTokenStore>) {
    let credentials = Arc::new(InMemoryCredentialStore::default());
    let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::default());
    let service = AuthService::new(&create_test_config(), credentials.clone(), refresh_tokens.clone()).unwrap();
    (service, credentials, refresh_tokens)
}

/// Everything a handler test needs: the server plus handles on the in-memory collaborators
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub refresh_tokens: Arc<InMemoryRefreshTokenStore>,
    pub reports: Arc<InMemoryReportSource>,
}

impl TestApp {
    /// `Authorization` header value carrying a valid access token for the given user
    pub fn bearer(&self, user_id: UserId, role: RoleId) -> String {
        bearer_for(&self.state, user_id, role)
    }
}

pub fn bearer_for(state: &AppState, user_id: UserId, role: RoleId) -> String {
    let token = state
        .auth
        .codec()
        .sign_access(TokenPayload {
            sub: user_id,
            role: Some(role),
        })
        .unwrap()
        .token;
    format!("Bearer {token}")
}

fn build_test_state() -> (AppState, Arc<InMemoryCredentialStore>, Arc<InMemoryRefreshTokenStore>, Arc<InMemoryReportSource>) {
    let config = create_test_config();
    let (auth, credentials, refresh_tokens) = create_test_auth_service();
    let reports = Arc::new(InMemoryReportSource::default());

    let db = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy(config.database_url.as_deref().unwrap())
        .unwrap();

    let state = AppState::builder()
        .db(db)
        .documents(DocumentRenderer::new(&config.documents))
        .config(config)
        .auth(auth)
        .reports(reports.clone() as Arc<dyn ReportSource>)
        .build();

    (state, credentials, refresh_tokens, reports)
}

pub fn create_test_state() -> AppState {
    build_test_state().0
}

pub fn create_test_app() -> TestApp {
    let (state, credentials, refresh_tokens, reports) = build_test_state();
    let router = crate::build_router(state.clone()).unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        state,
        credentials,
        refresh_tokens,
        reports,
    }
}

pub async fn seed_user(pool: &PgPool, email: &str) -> UserDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            name: None,
            role_id: ROLE_USER,
        })
        .await
        .unwrap()
}

pub async fn seed_cliente(pool: &PgPool, nombre: &str) -> ClienteDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    let email = format!("{}@example.com", nombre.to_lowercase().replace(' ', "."));
    Clientes::new(&mut conn)
        .create(&ClienteCreateDBRequest {
            nombre: nombre.to_string(),
            email,
            telefono: "600000000".to_string(),
        })
        .await
        .unwrap()
}

pub async fn seed_coloracion(pool: &PgPool, nombre: &str) -> ColoracionDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Coloraciones::new(&mut conn)
        .create(&ColoracionCreateDBRequest {
            nombre: nombre.to_string(),
            descripcion: format!("{nombre} con oxidante de 20 volúmenes"),
        })
        .await
        .unwrap()
}

/// Report at 10:30 on `fecha` with the default observaciones
pub async fn seed_reporte(
    pool: &PgPool,
    cliente_id: ClienteId,
    coloracion_id: ColoracionId,
    fecha: NaiveDate,
    precio: Decimal,
) -> ReporteDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Reportes::new(&mut conn)
        .create(&ReporteCreateDBRequest {
            cliente_id,
            fecha_servicio: fecha,
            hora_servicio: "10:30:00".to_string(),
            coloracion_id,
            formula: "7.1 + 20 vol".to_string(),
            observaciones: DEFAULT_OBSERVACIONES.to_string(),
            precio,
        })
        .await
        .unwrap()
}

pub async fn seed_foto(pool: &PgPool, reporte_id: ReporteId, filename: &str) -> FotoReporteDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    FotosReportes::new(&mut conn)
        .create(&FotoReporteCreateDBRequest {
            reporte_id,
            filename: filename.to_string(),
        })
        .await
        .unwrap()
}
