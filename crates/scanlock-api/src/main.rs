//! Scanlock API server binary.

use scanlock_api::{create_router, ApiConfig, AppState};
use scanlock_cache::MemoryVerificationCache;
use scanlock_db::{Database, PgLicenseStore};
use scanlock_service::{LicenseService, TracingAuditSink};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let service = Arc::new(LicenseService::new(
        Arc::new(PgLicenseStore::new(db.pool().clone())),
        Arc::new(MemoryVerificationCache::new()),
        Arc::new(TracingAuditSink),
    ));
    let state = Arc::new(AppState::new(service));

    let app = create_router(state)
        .layer(axum::middleware::from_fn(scanlock_api::middleware::request_id))
        .layer(scanlock_api::middleware::cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "scanlock api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
