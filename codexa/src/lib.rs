//! # codexa: identity service for the Codexa coding platform
//!
//! `codexa` owns accounts and sessions for Codexa: registration, login, logout with a token
//! blocklist, the authentication check every protected route runs, and self-service account
//! deletion. It also records submission intents against the signed-in user so the rest of the
//! platform (judge, problem catalogue, UI) can rely on a single source of identity.
//!
//! ## Request flow
//!
//! Credentials arrive as JSON. Registration validates the email grammar and password policy
//! ([`auth::validation`]), hashes the password with Argon2id on a blocking thread
//! ([`auth::password`]), stores the user and mints an HS256 session token ([`auth::session`]).
//! The token is handed out as an `HttpOnly` cookie, in the response body, or both, depending on
//! `auth.session.delivery`.
//!
//! Protected handlers take a [`api::models::users::CurrentUser`] argument. Its extractor reads
//! the token, verifies signature and expiry with no leeway, and consults the revocation list
//! ([`auth::revocation`]); any failure is a `401` before the handler runs. Logout writes the
//! token to the revocation list until the moment it would have expired anyway.
//!
//! ## Storage
//!
//! Users and submissions go through the [`db::store::Store`] seam. With `database.type: memory`
//! everything lives in process; with `database.type: external` the Postgres repositories in
//! [`db::handlers`] are used and migrations run at startup. The revocation list has the same two
//! backends; the Postgres one is purged by a background task.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use codexa::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = codexa::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     codexa::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod cors;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::{
        middleware::require_admin,
        password,
        revocation::{MemoryRevocationStore, PgRevocationStore, RevocationStore, run_purge_loop},
        validation::normalize_email,
    },
    config::{DatabaseConfig, RevocationBackend},
    db::{
        models::users::UserCreateDBRequest,
        store::{MemoryStore, PgStore, Store},
    },
    openapi::ApiDoc,
};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{SubmissionId, UserId};

/// Shared state handed to every handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(Arc::new(MemoryStore::new()))
///     .revocations(Arc::new(MemoryRevocationStore::new(10_000)))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub revocations: Arc<dyn RevocationStore>,
}

/// Get the codexa database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Skipped entirely when no password is configured. An existing account with the admin email is
/// left untouched, whatever its role.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(config: &Config, store: &dyn Store) -> anyhow::Result<Option<UserId>> {
    let Some(admin_password) = config.admin_password.as_deref() else {
        debug!("No admin_password configured, skipping admin bootstrap");
        return Ok(None);
    };

    let email = normalize_email(&config.admin_email);
    if let Some(existing) = store.user_by_email(&email).await? {
        debug!("Admin user {email} already exists");
        return Ok(Some(existing.id));
    }

    let password_hash = password::hash_password_blocking(admin_password.to_string(), config.auth.password.argon2_params())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    let admin = store
        .create_user(UserCreateDBRequest {
            first_name: "Admin".to_string(),
            email,
            password_hash,
            role: Role::Admin,
        })
        .await?;
    info!("Created initial admin user {}", admin.email);
    Ok(Some(admin.id))
}

/// Connect to and migrate the external database, if one is configured.
async fn setup_database(config: &Config) -> anyhow::Result<Option<PgPool>> {
    let DatabaseConfig::External { url, pool } = &config.database else {
        info!("Using in-memory storage: all data is lost on shutdown");
        return Ok(None);
    };

    info!("Using external database");
    let db = PgPoolOptions::new()
        .max_connections(pool.max_connections)
        .min_connections(pool.min_connections)
        .acquire_timeout(pool.acquire_timeout)
        .connect(url)
        .await?;
    migrator().run(&db).await?;

    Ok(Some(db))
}

fn setup_stores(config: &Config, pool: Option<&PgPool>) -> anyhow::Result<(Arc<dyn Store>, Arc<dyn RevocationStore>)> {
    let store: Arc<dyn Store> = match pool {
        Some(pool) => Arc::new(PgStore::new(pool.clone())),
        None => Arc::new(MemoryStore::new()),
    };

    let revocations: Arc<dyn RevocationStore> = match (config.revocation.backend, pool) {
        (RevocationBackend::Memory, _) => Arc::new(MemoryRevocationStore::new(config.revocation.max_entries)),
        (RevocationBackend::Postgres, Some(pool)) => Arc::new(PgRevocationStore::new(pool.clone())),
        (RevocationBackend::Postgres, None) => anyhow::bail!("revocation.backend=postgres requires an external database"),
    };

    Ok((store, revocations))
}

/// Build the HTTP router: API routes, docs, health check, then the CORS, metrics and trace layers.
pub fn build_router(state: &AppState) -> Router {
    let admin_routes = Router::new()
        .route("/user/admin/register", post(api::handlers::auth::admin_register))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let user_routes = Router::new()
        .route("/user/register", post(api::handlers::auth::register))
        .route("/user/login", post(api::handlers::auth::login))
        .route("/user/logout", post(api::handlers::auth::logout))
        .route("/user/check", get(api::handlers::auth::check))
        .route("/user/profile", delete(api::handlers::auth::delete_profile))
        .merge(admin_routes);

    let submission_routes = Router::new()
        .route("/submission/submit/{problem_id}", post(api::handlers::submissions::submit))
        .route("/submission/history", get(api::handlers::submissions::history));

    let router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(user_routes)
        .merge(submission_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(cors::create_cors_layer(&state.config));

    // The recorder is process-global, so this must only run once per process
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Tasks running alongside the HTTP server.
///
/// Dropping this cancels the shutdown token through `drop_guard`; [`shutdown`](Self::shutdown)
/// also waits for the tasks to finish.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Start the revocation purge task when the list lives in Postgres.
fn setup_background_services(config: &Config, pool: Option<&PgPool>, shutdown_token: CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if let (RevocationBackend::Postgres, Some(pool)) = (config.revocation.backend, pool) {
        let store = PgRevocationStore::new(pool.clone());
        let handle = tokio::spawn(run_purge_loop(store, config.revocation.purge_interval, shutdown_token.clone()));
        background_tasks.push(handle);
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// A fully wired service: storage connected, admin bootstrapped, background tasks running.
///
/// 1. **Create**: [`Application::new`] connects storage, runs migrations and starts the purge task
/// 2. **Serve**: [`Application::serve`] binds the configured address and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, tasks are stopped and the pool closed
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: Option<PgPool>,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting codexa with database: {:?}", config.database);

        let pool = setup_database(&config).await?;
        let (store, revocations) = setup_stores(&config, pool.as_ref())?;

        create_initial_admin_user(&config, store.as_ref()).await?;

        let bg_services = setup_background_services(&config, pool.as_ref(), CancellationToken::new());

        let app_state = AppState::builder()
            .config(config.clone())
            .store(store)
            .revocations(revocations)
            .build();
        let router = build_router(&app_state);

        Ok(Self {
            router,
            app_state,
            config,
            pool,
            bg_services,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Codexa listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_config, create_test_state};
    use axum::http::{HeaderValue, StatusCode, header};

    #[test_log::test(tokio::test)]
    async fn test_application_with_memory_storage() {
        let mut config = create_test_config();
        config.admin_password = Some("adminpass1".to_string());
        let admin_email = config.admin_email.clone();

        let app = Application::new(config).await.expect("Failed to create application");
        assert!(app.pool.is_none());
        let admin = app.state().store.user_by_email(&admin_email).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);

        let (server, bg_services) = app.into_test_server();
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "ok");

        // The bootstrapped admin can sign in
        server
            .post("/user/login")
            .json(&serde_json::json!({"emailId": admin_email, "password": "adminpass1"}))
            .await
            .assert_status_ok();

        bg_services.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_initial_admin_is_idempotent_and_optional() {
        let state = create_test_state(create_test_config());
        assert_eq!(create_initial_admin_user(&state.config, state.store.as_ref()).await.unwrap(), None);

        let mut config = create_test_config();
        config.admin_password = Some("adminpass1".to_string());
        let first = create_initial_admin_user(&config, state.store.as_ref()).await.unwrap();
        let second = create_initial_admin_user(&config, state.store.as_ref()).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_postgres_revocation_needs_database() {
        let mut config = create_test_config();
        config.revocation.backend = RevocationBackend::Postgres;
        assert!(setup_stores(&config, None).is_err());

        config.revocation.backend = RevocationBackend::Memory;
        assert!(setup_stores(&config, None).is_ok());
    }

    #[tokio::test]
    async fn test_docs_are_served() {
        let server = crate::test_utils::create_test_server(create_test_config());
        server.get("/docs").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let server = crate::test_utils::create_test_server(create_test_config());

        let response = server
            .method(axum::http::Method::OPTIONS, "/user/login")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:5173"))
            .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("POST"))
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some(&HeaderValue::from_static("true"))
        );

        let blocked = server
            .method(axum::http::Method::OPTIONS, "/user/login")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://evil.example"))
            .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("POST"))
            .await;
        assert!(blocked.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_background_services_stop_on_shutdown() {
        let token = CancellationToken::new();
        let services = setup_background_services(&create_test_config(), None, token.clone());
        services.shutdown().await;
        assert!(token.is_cancelled());
    }
}
