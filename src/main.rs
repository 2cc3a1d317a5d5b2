use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_backoffice_api::config::Config;
use fleet_backoffice_api::db::Database;
use fleet_backoffice_api::handlers::{self, AppState};
use fleet_backoffice_api::import;
use fleet_backoffice_api::notifier::NotifyClient;

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the working directory and serves it with the
/// appropriate content type. Returns 404 if the file is missing.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page pointing at `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Fleet Back-Office API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, the summary
/// cache and the notification webhook client, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_backoffice_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Summary cache (60 second TTL). Mutations invalidate it eagerly; the
    // TTL only bounds staleness if an invalidation is ever missed.
    let summary_cache = Cache::builder()
        .time_to_live(Duration::from_secs(60))
        .max_capacity(10_000)
        .build();
    tracing::info!("Summary cache initialized");

    // Initialize notification webhook client (optional)
    let notify_client = match &config.notify_webhook_url {
        Some(url) => match NotifyClient::new(url.clone(), config.notify_webhook_token.clone()) {
            Ok(client) => {
                tracing::info!("✓ Notification webhook client initialized: {}", url);
                Some(client)
            }
            Err(e) => {
                tracing::error!("Failed to initialize notification client: {}", e);
                None
            }
        },
        None => {
            tracing::info!("No notification webhook configured; notifications stay in-app only");
            None
        }
    };

    // Build application state
    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        notify_client,
        summary_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        // Lead endpoints
        .route(
            "/api/v1/leads",
            post(handlers::create_lead).get(handlers::list_leads),
        )
        .route("/api/v1/leads/summary", get(handlers::lead_summary))
        .route(
            "/api/v1/leads/:id/status",
            patch(handlers::update_lead_status),
        )
        .route("/api/v1/leads/:id", delete(handlers::delete_lead))
        .route("/api/v1/leads/:id/hard", delete(handlers::hard_delete_lead))
        // Lead import/export
        .route("/api/v1/leads/import", post(import::import_leads))
        .route("/api/v1/leads/export", get(import::export_leads))
        // Rider endpoints
        .route(
            "/api/v1/riders",
            post(handlers::create_rider).get(handlers::list_riders),
        )
        .route(
            "/api/v1/riders/:id",
            get(handlers::get_rider)
                .patch(handlers::update_rider)
                .delete(handlers::delete_rider),
        )
        .route("/api/v1/riders/:id/wallet", post(handlers::adjust_wallet))
        // Rider import/export
        .route("/api/v1/riders/import", post(import::import_riders))
        .route("/api/v1/riders/export", get(import::export_riders))
        // Notification endpoints
        .route("/api/v1/notifications", get(handlers::list_notifications))
        .route(
            "/api/v1/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (covers CSV imports)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
