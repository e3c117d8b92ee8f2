pub mod config;
pub mod db;
pub mod errors;
pub mod http;
pub mod models;
pub mod routes;
pub mod services;
pub mod system;
pub mod views;

#[cfg(test)]
pub(crate) mod test_support;

use axum::body::Body;
use axum::routing::get;
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;
use crate::db::init_db;
use crate::errors::AppError;
use crate::http::tracing::{make_custom_span, on_custom_failure, on_custom_request, on_custom_response};
use crate::routes::{about, accounts_router, catalog_router, contact, home, interactions_router, profile_router};
use crate::system::create_system_router;

#[derive(Clone)]
pub struct InnerState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
}

impl InnerState {
    pub fn new(db: SqlitePool, config: AppConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound("No route".to_string())
}

/// The whole site: pages, uploaded media, sessions, tracing and CORS.
pub fn create_app(state: InnerState) -> Router {
    let session = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.session_secure)
        .with_expiry(Expiry::OnInactivity(Duration::days(state.config.session_days)));

    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .route("/", get(home))
        .route("/about/", get(about))
        .route("/contact/", get(contact))
        .merge(catalog_router())
        .merge(interactions_router())
        .merge(profile_router())
        .merge(accounts_router())
        .merge(create_system_router())
        .nest_service("/media", media)
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_custom_span::<Body>)
                .on_request(on_custom_request::<Body>)
                .on_response(on_custom_response::<Body>)
                .on_failure(on_custom_failure),
        )
        .layer(session)
        .with_state(state)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screenbox=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Reads the configuration, opens the database and serves until shutdown.
pub async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let db = init_db(&config).await?;
    let address = config.bind_address();

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = create_app(InnerState::new(db, config))
        .route("/metrics", get(move || async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
