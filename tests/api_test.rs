//! Functional tests for the HTTP API

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use llm_inference_gateway::api::routes::create_router;
use llm_inference_gateway::backend;
use llm_inference_gateway::config::Settings;
use llm_inference_gateway::logging::RequestLog;
use llm_inference_gateway::metrics::MetricsRegistry;
use llm_inference_gateway::middleware::rate_limit::RateLimiter;
use llm_inference_gateway::queue::JobQueue;
use llm_inference_gateway::AppState;

const API_KEY: &str = "test-key-1";

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.api_keys = vec![API_KEY.to_string()];
    settings.rate_limit.requests_per_minute = 60;
    settings.rate_limit.burst_size = 10;
    settings.queue.max_concurrent = 4;
    settings
}

async fn test_app(settings: Settings) -> (Router, Arc<AppState>) {
    let tmp = tempfile::tempdir().unwrap();
    let request_log = Arc::new(RequestLog::new(tmp.path()).unwrap());
    let metrics = Arc::new(MetricsRegistry::new().unwrap());

    let execution_timeout = Duration::from_secs(settings.queue.timeout_secs);
    let backend = backend::build_backend(&settings.backend, execution_timeout).unwrap();

    let queue = JobQueue::new(
        backend.clone(),
        settings.queue.clone(),
        metrics.clone(),
        request_log,
    );

    let limiter = Arc::new(RateLimiter::new(
        settings.rate_limit.requests_per_minute,
        settings.rate_limit.burst_size,
    ));

    let state = Arc::new(AppState {
        settings,
        backend,
        queue,
        limiter,
        metrics,
    });

    (create_router(state.clone()).await, state)
}

fn generate_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header("content-type", "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", API_KEY))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_generate_requires_api_key() {
    let (app, _state) = test_app(test_settings()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt": "hello"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_api_key_rejected() {
    let (app, _state) = test_app(test_settings()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate")
                .header("content-type", "application/json")
                .header(AUTHORIZATION, "Bearer wrong-key")
                .body(Body::from(r#"{"prompt": "hello"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_submit_returns_queued_job() {
    let (app, _state) = test_app(test_settings()).await;

    let response = app
        .oneshot(generate_request(r#"{"prompt": "hello", "max_tokens": 10}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "queued");
    assert!(!body["job_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_prompt_rejected_before_submission() {
    let (app, state) = test_app(test_settings()).await;

    let response = app
        .oneshot(generate_request(r#"{"prompt": ""}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");

    // No job record was created for the rejected request.
    assert_eq!(state.queue.tracked_jobs(), 0);
}

#[tokio::test]
async fn test_out_of_range_sampling_rejected() {
    let (app, _state) = test_app(test_settings()).await;

    let response = app
        .oneshot(generate_request(
            r#"{"prompt": "hello", "temperature": 3.0}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_generation_round_trip() {
    let (app, _state) = test_app(test_settings()).await;

    let response = app
        .clone()
        .oneshot(generate_request(r#"{"prompt": "hello", "max_tokens": 10}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let submit_body = body_json(response).await;
    let job_id = submit_body["job_id"].as_str().unwrap().to_string();

    // Immediate status check: queued or already processing/terminal.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/status/{}", job_id))
                .header(AUTHORIZATION, format!("Bearer {}", API_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Poll the result until completion.
    let mut completed = None;
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/result/{}", job_id))
                    .header(AUTHORIZATION, format!("Bearer {}", API_KEY))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        if response.status() == StatusCode::OK {
            completed = Some(body_json(response).await);
            break;
        }

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let body = completed.expect("job did not complete in time");
    assert_eq!(body["status"], "completed");
    assert!(!body["result"].as_str().unwrap().is_empty());
    assert!(body["metrics"]["completion_tokens"].as_u64().unwrap() <= 10);

    // Result retrieval is repeatable: a second call returns the same body.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/result/{}", job_id))
                .header(AUTHORIZATION, format!("Bearer {}", API_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, body);
}

#[tokio::test]
async fn test_burst_exhaustion_rate_limits_submission() {
    let (app, _state) = test_app(test_settings()).await;

    let mut accepted = 0;
    let mut limited = 0;

    for _ in 0..11 {
        let response = app
            .clone()
            .oneshot(generate_request(r#"{"prompt": "burst"}"#))
            .await
            .unwrap();

        match response.status() {
            StatusCode::ACCEPTED => accepted += 1,
            StatusCode::TOO_MANY_REQUESTS => {
                limited += 1;

                assert!(response.headers().contains_key("retry-after"));
                let body = body_json(response).await;
                assert_eq!(body["error"]["type"], "rate_limit_error");
                // R = 1 token/s, so the wait is about one second.
                let retry_after = body["error"]["retry_after"].as_f64().unwrap();
                assert!(retry_after > 0.0 && retry_after <= 1.0);
            }
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(limited, 1);
}

#[tokio::test]
async fn test_unknown_job_returns_not_found() {
    let (app, _state) = test_app(test_settings()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/status/does-not-exist")
                .header(AUTHORIZATION, format!("Bearer {}", API_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "unknown_job");
}

#[tokio::test]
async fn test_health_bypasses_auth() {
    let (app, _state) = test_app(test_settings()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue_connected"], true);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (app, _state) = test_app(test_settings()).await;

    // Serve one request so the counters have something to show.
    let response = app
        .clone()
        .oneshot(generate_request(r#"{"prompt": "metrics"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("jobs_submitted_total"));
    assert!(text.contains("jobs_in_flight"));
}

#[tokio::test]
async fn test_stream_ends_with_done_marker() {
    let (app, state) = test_app(test_settings()).await;

    let job_id = {
        let response = app
            .clone()
            .oneshot(generate_request(r#"{"prompt": "stream me", "max_tokens": 4}"#))
            .await
            .unwrap();
        body_json(response).await["job_id"]
            .as_str()
            .unwrap()
            .to_string()
    };

    // Wait until the job is terminal so the stream is finite and short.
    for _ in 0..200 {
        if state
            .queue
            .status(&job_id)
            .map(|s| s.is_terminal())
            .unwrap_or(false)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/stream/{}", job_id))
                .header(AUTHORIZATION, format!("Bearer {}", API_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("\"status\":\"completed\""));
    assert!(text.contains("[DONE]"));
}
