mod app_state;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod services;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::dispatch::JobDispatcher;
use services::processor::ImageProcessor;
use services::webhook::WebhookNotifier;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing imgbatch server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("batches_ingested_total", "Total CSV batches accepted");
    metrics::describe_counter!(
        "images_processed_total",
        "Total images recompressed successfully"
    );
    metrics::describe_counter!(
        "images_failed_total",
        "Total images that failed fetch or recompression"
    );
    metrics::describe_histogram!(
        "image_processing_seconds",
        "Time to fetch, recompress, and persist one image"
    );
    metrics::describe_counter!(
        "webhook_deliveries_total",
        "Completion webhooks delivered with HTTP 200"
    );
    metrics::describe_counter!(
        "webhook_failures_total",
        "Completion webhooks rejected or undeliverable"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to SQLite database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Output directory for recompressed images
    std::fs::create_dir_all(&config.output_dir).expect("Failed to create output directory");

    // Wire the background pipeline
    let notifier = WebhookNotifier::new(Duration::from_secs(config.webhook_timeout_secs))
        .expect("Failed to initialize webhook client");
    let processor = ImageProcessor::new(
        db_pool.clone(),
        notifier,
        &config.output_dir,
        Duration::from_secs(config.fetch_timeout_secs),
        config.jpeg_quality,
    )
    .expect("Failed to initialize image processor");
    let dispatcher = JobDispatcher::new(db_pool.clone(), processor, config.worker_concurrency);

    // Create shared application state
    let state = AppState::new(db_pool, dispatcher);

    // Build API routes
    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting imgbatch on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
