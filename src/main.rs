use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ocr_scan_pipeline::{
    app_state::{AppState, PipelineSettings},
    config::AppConfig,
    db, routes,
    services::{
        classification::ClassificationClient, ocr::TextDetectionClient, queue::NotificationQueue,
        storage::S3Storage,
    },
    telemetry,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing ocr-scan-pipeline server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    telemetry::describe_metrics();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let storage = S3Storage::new(
        &config.s3_region,
        &config.s3_endpoint,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize S3 client");

    tracing::info!("Connecting to Redis notification queue");
    let queue = NotificationQueue::new(&config.redis_url).expect("Failed to initialize queue");

    let ocr = TextDetectionClient::new(
        &config.ocr_endpoint,
        &config.ocr_api_token,
        &config.ocr_notification_topic,
        &config.ocr_notification_role,
    )
    .expect("Failed to initialize OCR client");

    let classifier = ClassificationClient::new(
        &config.classification_endpoint,
        &config.classification_api_token,
        config.custom_data_identifiers(),
    )
    .expect("Failed to initialize classification client");

    let state = AppState::new(
        db_pool,
        Arc::new(storage),
        queue,
        Arc::new(ocr),
        Arc::new(classifier),
        PipelineSettings {
            bucket: config.s3_bucket.clone(),
            output_prefix: config.output_prefix.clone(),
            account_id: config.account_id.clone(),
        },
    );

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/batches", post(routes::batches::launch_batch))
        .route(
            "/api/v1/notifications",
            post(routes::notifications::receive_notifications),
        )
        .route("/api/v1/jobs/{job_id}", get(routes::jobs::get_job))
        .with_state(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
