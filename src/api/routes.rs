//! HTTP routes and handlers for the gateway

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::models::{
    FailedResponse, GenerateRequest, HealthResponse, ResultResponse, StatusResponse,
    SubmitResponse,
};
use crate::error::{AppError, Result};
use crate::metrics::MetricsRegistry;
use crate::middleware::auth::{AuthLayer, CallerIdentity, ANONYMOUS_IDENTITY};
use crate::queue::{JobOutcome, JobPoll};
use crate::streaming::{JobEvent, ProgressStreamer};
use crate::AppState;

/// Build the application router with all middleware attached.
pub async fn create_router(state: Arc<AppState>) -> Router {
    let auth_layer = if state.settings.auth.enabled {
        AuthLayer::new(state.settings.auth.api_keys.clone())
    } else {
        AuthLayer::disabled()
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_export))
        .route("/generate", post(generate))
        .route("/status/:job_id", get(job_status))
        .route("/result/:job_id", get(job_result))
        .route("/stream/:job_id", get(stream_job))
        .layer(auth_layer)
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            http_metrics,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Records request count and latency for every route except the
/// exposition endpoint itself.
async fn http_metrics(
    State(metrics): State<Arc<MetricsRegistry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if path == "/metrics" {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    metrics.record_http_request(
        &method,
        route_label(&path),
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Collapse per-job paths onto one label so job IDs don't explode the
/// metric cardinality.
fn route_label(path: &str) -> &str {
    if path.starts_with("/status/") {
        "/status/{job_id}"
    } else if path.starts_with("/result/") {
        "/result/{job_id}"
    } else if path.starts_with("/stream/") {
        "/stream/{job_id}"
    } else {
        path
    }
}

/// `GET /` — API information
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "LLM Inference Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "metrics": "/metrics",
    }))
}

/// `GET /health` — substrate reachability and backend readiness
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let queue_connected = state.queue.is_open();
    let backend_ready = state.backend.readiness().await;

    state
        .metrics
        .set_dependency_health(queue_connected, backend_ready);

    Json(HealthResponse {
        status: if queue_connected { "healthy" } else { "degraded" },
        queue_connected,
        backend_ready,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /metrics` — Prometheus text exposition
async fn metrics_export(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// `POST /generate` — validate, admit, enqueue.
///
/// Validation runs before the rate limiter so malformed requests never
/// consume admission tokens; both run before any queue interaction.
async fn generate(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<CallerIdentity>>,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;

    let identity = identity
        .map(|Extension(identity)| identity.0)
        .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string());

    if state.settings.rate_limit.enabled && !state.limiter.check(&identity) {
        return Err(AppError::RateLimitExceeded {
            retry_after: state.limiter.retry_after(&identity),
        });
    }

    let user_id = request.user_id.clone();
    let prompt_chars = request.prompt.chars().count();
    let job_id = state.queue.submit(request.into_params(), user_id)?;

    info!(job_id = %job_id, prompt_chars, "Generation request queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            status: "queued",
            job_id,
            message: "Your request is being processed. Use the job_id to check status.",
        }),
    ))
}

/// `GET /status/{job_id}` — current job status
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let status = state.queue.status(&job_id)?;

    Ok(Json(StatusResponse {
        status,
        message: status.describe(),
        job_id,
    }))
}

/// `GET /result/{job_id}` — result retrieval, safely repeatable
async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response> {
    let response = match state.queue.result(&job_id)? {
        JobPoll::Pending(status) => (
            StatusCode::ACCEPTED,
            Json(StatusResponse {
                status,
                message: status.describe(),
                job_id,
            }),
        )
            .into_response(),
        JobPoll::Ready(JobOutcome::Completed { result, metrics }) => Json(ResultResponse {
            status: "completed",
            job_id,
            result,
            metrics,
        })
        .into_response(),
        JobPoll::Ready(JobOutcome::Failed {
            error_message,
            error_kind,
            ..
        }) => Json(FailedResponse {
            status: "error",
            job_id,
            error_message,
            error_kind,
        })
        .into_response(),
    };

    Ok(response)
}

/// `GET /stream/{job_id}` — job progress as Server-Sent Events
async fn stream_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>> {
    let streamer = ProgressStreamer::new(
        state.queue.clone(),
        Duration::from_millis(state.settings.streaming.poll_interval_ms),
    );

    let events = streamer
        .events(job_id.clone())
        .map(move |event| Ok(event_to_sse(&job_id, event)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Serialize a progress event into its SSE data frame.
fn event_to_sse(job_id: &str, event: JobEvent) -> Event {
    match event {
        JobEvent::Status { status, message } => Event::default().data(
            json!({
                "status": status,
                "job_id": job_id,
                "message": message,
            })
            .to_string(),
        ),
        JobEvent::Completed { result, metrics } => Event::default().data(
            json!({
                "status": "completed",
                "job_id": job_id,
                "result": result,
                "metrics": metrics,
            })
            .to_string(),
        ),
        JobEvent::Failed {
            error_message,
            error_kind,
        } => Event::default().data(
            json!({
                "status": "error",
                "job_id": job_id,
                "error_message": error_message,
                "error_kind": error_kind,
            })
            .to_string(),
        ),
        JobEvent::Done => Event::default().data("[DONE]"),
    }
}
