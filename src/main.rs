//! SchemaDoc API - governed AI documentation for catalog metadata
//!
//! Generates table and column descriptions with a hosted model, queues them
//! for human review, and writes approved text back as catalog comments.
//!
//! Workflow:
//! - Generate: undocumented tables and columns get AI descriptions (PENDING)
//! - Review: a reviewer approves, edits or rejects each description
//! - Apply: approved descriptions become table/column comments (APPLIED)

mod catalog;
mod config;
mod db;
mod error;
mod generation;
mod governance;
mod llm;
mod models;
mod routes;
mod state;

use crate::catalog::PostgresCatalog;
use crate::config::{Settings, StoreBackend};
use crate::db::DbConnectionConfig;
use crate::governance::{InMemoryGovernanceStore, PostgresGovernanceStore, SharedStore};
use crate::llm::ServingEndpointClient;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting SchemaDoc - AI description governance...");

    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let store = init_store(&settings).await?;
    if let Err(e) = store.setup().await {
        warn!("⚠️  Governance store setup failed, retry with POST /api/setup: {}", e);
    }

    let catalog = Arc::new(PostgresCatalog::new(
        DbConnectionConfig::from(&settings.catalog.server),
        settings.catalog.statement_timeout_ms,
    ));
    let generator = Arc::new(ServingEndpointClient::new(&settings.generator)?);
    info!(
        "🤖 Model endpoint '{}' at {} ({} req/s)",
        settings.generator.endpoint, settings.generator.base_url, settings.generator.requests_per_second
    );

    let state = Arc::new(AppState::new(settings.clone(), store, catalog, generator));
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Workflow ───");
    info!("   POST /api/setup                - Create governance table");
    info!("   POST /api/generate             - Generate descriptions");
    info!("   POST /api/review/{{id}}          - Approve or reject a description");
    info!("   POST /api/apply                - Apply approved descriptions");
    info!("");
    info!("   ─── Dashboard ───");
    info!("   GET  /api/stats                - Review statistics");
    info!("   GET  /api/pending              - Review queue");
    info!("   GET  /api/schema-progress      - Progress per schema");
    info!("   GET  /api/review-activity      - Reviewer activity");
    info!("   GET  /api/coverage             - Catalog documentation coverage");
    info!("");
    info!("   ─── Catalog ───");
    info!("   POST /api/permissions          - Check permissions");
    info!("   GET  /api/catalogs             - List catalogs");
    info!("   GET  /api/schemas              - List schemas");
    info!("   GET  /api/tables               - List tables");
    info!("");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schemadoc_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Build the governance store selected by STORE_BACKEND
async fn init_store(settings: &Settings) -> anyhow::Result<SharedStore> {
    match settings.governance.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&DbConnectionConfig::from(&settings.database))?;
            db::verify_pool(&pool).await?;
            let store = PostgresGovernanceStore::new(pool, &settings.governance.governance_schema)?;
            info!("🗄️  Governance store: PostgreSQL ({})", settings.database.database);
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("⚠️  Governance store is in-memory; records are lost on restart");
            Ok(Arc::new(InMemoryGovernanceStore::new()))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
