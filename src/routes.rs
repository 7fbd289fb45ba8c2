//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod catalog;
mod governance;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    let cors = build_cors_layer(settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        .route("/health", get(health_check))
        // Governance workflow
        .route("/api/setup", post(governance::setup))
        .route("/api/generate", post(governance::generate))
        .route("/api/review/{id}", post(governance::review))
        .route("/api/apply", post(governance::apply))
        .route("/api/stats", get(governance::stats))
        .route("/api/pending", get(governance::pending))
        .route("/api/schema-progress", get(governance::schema_progress))
        .route("/api/review-activity", get(governance::review_activity))
        // Catalog browsing
        .route("/api/coverage", get(catalog::coverage))
        .route("/api/permissions", post(catalog::check_permissions))
        .route("/api/catalogs", get(catalog::list_catalogs))
        .route("/api/schemas", get(catalog::list_schemas))
        .route("/api/tables", get(catalog::list_tables))
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-forwarded-email"),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::FakeCatalog;
    use crate::catalog::TableRef;
    use crate::governance::InMemoryGovernanceStore;
    use crate::llm::fake::ScriptedGenerator;
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<FakeCatalog>) {
        let catalog = Arc::new(FakeCatalog::new());
        catalog
            .add_table(
                &TableRef::new("main", "sales", "orders"),
                None,
                &[("id", "bigint", None), ("status", "text", None)],
            )
            .await;
        catalog
            .add_table(&TableRef::new("main", "hr", "staff"), Some("Staff directory"), &[])
            .await;

        let mut settings = Settings::default();
        settings.generator.requests_per_second = 1_000.0;
        let state = Arc::new(AppState::new(
            settings.clone(),
            Arc::new(InMemoryGovernanceStore::new()),
            catalog.clone(),
            Arc::new(ScriptedGenerator::new()),
        ));
        (create_router(state, &settings), catalog)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app().await;
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_generate_review_apply_flow() {
        let (app, catalog) = app().await;

        let (status, body) = call(&app, Method::POST, "/api/setup", None).await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/generate",
            Some(json!({ "schema": "sales", "batch_size": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["results"]["totalFound"], 1);
        assert_eq!(body["results"]["generated"], 3);
        assert_eq!(body["results"]["items"][0]["type"], "TABLE");

        let (_, body) = call(&app, Method::GET, "/api/pending?page=1&per_page=2", None).await;
        let records = body["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["reviewStatus"], "PENDING");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/review/1")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-email", "carol@example.com")
            .body(Body::from(json!({ "status": "APPROVED" }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/review/2",
            Some(json!({ "status": "REJECTED", "reviewer": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["reviewer"], "alice");

        let (status, body) = call(&app, Method::POST, "/api/apply", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], json!({ "applied": 1, "errors": 0, "deadLettered": 0 }));
        assert_eq!(catalog.writes().await.len(), 1);

        let (_, body) = call(&app, Method::GET, "/api/stats", None).await;
        assert_eq!(body["stats"]["applied"], 1);
        assert_eq!(body["stats"]["rejected"], 1);
        assert_eq!(body["stats"]["pending"], 1);

        let (_, body) = call(&app, Method::GET, "/api/review-activity", None).await;
        let reviewers: Vec<_> = body["activity"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["reviewer"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(reviewers, vec!["alice".to_string(), "carol@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_review_errors_map_to_status_codes() {
        let (app, _) = app().await;
        call(&app, Method::POST, "/api/generate", Some(json!({ "schema": "sales" }))).await;

        let (status, body) = call(&app, Method::POST, "/api/review/1", Some(json!({ "status": "PENDING" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = call(&app, Method::POST, "/api/review/99", Some(json!({ "status": "APPROVED" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, "/api/review/1", Some(json!({ "status": "APPLIED" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_pending_rejects_page_past_limit() {
        let (app, _) = app().await;

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/pending?page=9223372036854775807&per_page=200",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = call(&app, Method::GET, "/api/pending?page=1000000&per_page=200", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"], json!([]));
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_input() {
        let (app, _) = app().await;
        let (status, _) = call(&app, Method::POST, "/api/generate", Some(json!({ "batch_size": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/generate",
            Some(json!({ "schema": "sales; DROP SCHEMA x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_catalog_browsing_and_coverage() {
        let (app, _) = app().await;

        let (_, body) = call(&app, Method::GET, "/api/catalogs", None).await;
        assert_eq!(body["catalogs"], json!(["main"]));

        let (_, body) = call(&app, Method::GET, "/api/schemas?catalog=main", None).await;
        assert_eq!(body["schemas"], json!(["sales", "hr"]));

        let (_, body) = call(&app, Method::GET, "/api/tables?catalog=main&schema=sales", None).await;
        assert_eq!(body["tables"][0]["tableName"], "orders");

        let (_, body) = call(&app, Method::GET, "/api/coverage", None).await;
        assert_eq!(body["catalog"], "main");
        assert_eq!(body["schemas"][0]["schemaName"], "hr");
        assert_eq!(body["schemas"][1]["missing"], 1);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/permissions",
            Some(json!({ "catalog": "main", "schema": "sales" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["permissions"]["canModify"], true);
    }
}
