//! Main entry point for the LLM Inference Gateway

use llm_inference_gateway::{
    api, backend,
    config::Settings,
    logging::RequestLog,
    metrics::MetricsRegistry,
    middleware::rate_limit::RateLimiter,
    queue::JobQueue,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));

    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    info!("Starting LLM Inference Gateway");
    info!(
        "Loaded configuration: server={}:{} backend={}",
        settings.server.host, settings.server.port, settings.backend.kind
    );

    // Request/error log files
    let request_log = Arc::new(RequestLog::new(&settings.logging.dir)?);

    // Metrics registry
    let metrics = Arc::new(MetricsRegistry::new()?);

    // Generation backend, selected once from configuration
    let execution_timeout = Duration::from_secs(settings.queue.timeout_secs);
    let backend = backend::build_backend(&settings.backend, execution_timeout)?;
    info!(backend = backend.name(), "Backend initialized");

    // Job queue with its worker pool
    let queue = JobQueue::new(
        backend.clone(),
        settings.queue.clone(),
        metrics.clone(),
        request_log,
    );

    // Admission control
    let limiter = Arc::new(RateLimiter::new(
        settings.rate_limit.requests_per_minute,
        settings.rate_limit.burst_size,
    ));

    // Create application state
    let app_state = Arc::new(AppState {
        settings: settings.clone(),
        backend,
        queue,
        limiter,
        metrics,
    });

    // Build the router
    let app = api::routes::create_router(app_state).await;

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
