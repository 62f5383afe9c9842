//! Integration tests for the remote HTTP backend, using a mock server

use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llm_inference_gateway::backend::remote::RemoteBackend;
use llm_inference_gateway::backend::traits::{GenerationBackend, GenerationRequest};
use llm_inference_gateway::config::BackendConfig;

fn remote_config(base_url: &str) -> BackendConfig {
    BackendConfig {
        kind: "remote".to_string(),
        engine: "echo".to_string(),
        model: "test-model".to_string(),
        base_url: base_url.to_string(),
        connect_timeout_secs: 2,
    }
}

fn request(prompt: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        max_tokens: 64,
        temperature: 0.7,
        top_p: 0.9,
    }
}

#[tokio::test]
async fn test_successful_generation_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": false,
            "options": {"num_predict": 64}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "generated text",
            "prompt_eval_count": 5,
            "eval_count": 12
        })))
        .mount(&server)
        .await;

    let backend =
        RemoteBackend::new(&remote_config(&server.uri()), Duration::from_secs(5)).unwrap();

    let generation = backend.generate(&request("hello")).await.unwrap();
    assert_eq!(generation.text, "generated text");
    assert_eq!(generation.prompt_tokens, 5);
    assert_eq!(generation.completion_tokens, 12);
}

#[tokio::test]
async fn test_thinking_field_fallback() {
    let server = MockServer::start().await;

    // Thinking models can return an empty response with the output in
    // the thinking field instead.
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "",
            "thinking": "thought out loud",
            "prompt_eval_count": 3,
            "eval_count": 7
        })))
        .mount(&server)
        .await;

    let backend =
        RemoteBackend::new(&remote_config(&server.uri()), Duration::from_secs(5)).unwrap();

    let generation = backend.generate(&request("hello")).await.unwrap();
    assert_eq!(generation.text, "thought out loud");
}

#[tokio::test]
async fn test_non_2xx_maps_to_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let backend =
        RemoteBackend::new(&remote_config(&server.uri()), Duration::from_secs(5)).unwrap();

    let err = backend
        .generate(&request("hello"))
        .await
        .expect_err("500 should fail");
    assert_eq!(err.kind(), "BackendError");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_connection_failure_maps_to_backend_error() {
    // Nothing listens on this port.
    let backend = RemoteBackend::new(
        &remote_config("http://127.0.0.1:59999"),
        Duration::from_secs(2),
    )
    .unwrap();

    let err = backend
        .generate(&request("hello"))
        .await
        .expect_err("connection should fail");
    assert_eq!(err.kind(), "BackendError");
}

#[tokio::test]
async fn test_readiness_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "test-model"}]
        })))
        .mount(&server)
        .await;

    let backend =
        RemoteBackend::new(&remote_config(&server.uri()), Duration::from_secs(5)).unwrap();
    assert!(backend.readiness().await);

    let unreachable = RemoteBackend::new(
        &remote_config("http://127.0.0.1:59999"),
        Duration::from_secs(2),
    )
    .unwrap();
    assert!(!unreachable.readiness().await);
}
