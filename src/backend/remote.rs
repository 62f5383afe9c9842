//! Remote HTTP generation backend
//!
//! Issues a single synchronous call per job to an external text-generation
//! service speaking the Ollama generate API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::{BackendError, Generation, GenerationBackend, GenerationRequest};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

/// HTTP client for a remote text-generation service
pub struct RemoteBackend {
    name: String,
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ApiGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ApiGenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl RemoteBackend {
    /// Create a remote backend from configuration.
    ///
    /// `request_timeout` bounds the full round-trip; it should match the
    /// execution deadline the job queue enforces so the client gives up
    /// no later than the substrate does.
    pub fn new(config: &BackendConfig, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: "remote".to_string(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<Generation, BackendError> {
        let url = format!("{}/api/generate", self.base_url);

        let api_request = ApiGenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: ApiOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
                top_p: request.top_p,
            },
        };

        debug!(backend = %self.name, url = %url, model = %self.model, "Sending generate request");

        let response = self
            .client
            .post(&url)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(format!("request to {} timed out", self.base_url))
                } else if e.is_connect() {
                    BackendError::Connect(format!(
                        "cannot reach {}: {}. Is the generation service running?",
                        self.base_url, e
                    ))
                } else {
                    BackendError::Generation(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(backend = %self.name, code, "Generation service returned error status");
            return Err(BackendError::Status { code, body });
        }

        let api_response: ApiGenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Generation(format!("failed to parse response: {}", e)))?;

        // Thinking models may leave the primary response field empty and put
        // their output in `thinking`; fall back to it so such models still
        // produce a result. This stays a quirk of this backend, not part of
        // the executor contract.
        let text = if api_response.response.is_empty() {
            api_response.thinking.unwrap_or_default()
        } else {
            api_response.response
        };

        Ok(Generation {
            text,
            prompt_tokens: api_response.prompt_eval_count,
            completion_tokens: api_response.eval_count,
        })
    }

    async fn readiness(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(backend = %self.name, "Readiness probe passed");
                true
            }
            Ok(response) => {
                debug!(
                    backend = %self.name,
                    status = %response.status(),
                    "Readiness probe failed"
                );
                false
            }
            Err(e) => {
                debug!(backend = %self.name, error = %e, "Readiness probe failed");
                false
            }
        }
    }
}
