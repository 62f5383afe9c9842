//! Request and response bodies for the HTTP API

use serde::{Deserialize, Serialize};

use crate::backend::traits::GenerationRequest;
use crate::error::{AppError, Result};
use crate::queue::{JobMetrics, JobStatus};

/// Upper bound on prompt length, in characters
pub const MAX_PROMPT_CHARS: usize = 10_000;

/// Upper bound on requested generation length
pub const MAX_TOKENS_LIMIT: u32 = 2048;

/// Body of `POST /generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    /// Input prompt for generation
    pub prompt: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling parameter
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Optional user identifier, used for submission metrics
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

impl GenerateRequest {
    /// Reject malformed input before any admission or queueing happens.
    pub fn validate(&self) -> Result<()> {
        let prompt_chars = self.prompt.chars().count();
        if prompt_chars == 0 {
            return Err(AppError::Validation("prompt must not be empty".to_string()));
        }
        if prompt_chars > MAX_PROMPT_CHARS {
            return Err(AppError::Validation(format!(
                "prompt exceeds {} characters",
                MAX_PROMPT_CHARS
            )));
        }
        if self.max_tokens == 0 || self.max_tokens > MAX_TOKENS_LIMIT {
            return Err(AppError::Validation(format!(
                "max_tokens must be between 1 and {}",
                MAX_TOKENS_LIMIT
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Validation(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(AppError::Validation(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// The backend-facing parameter set.
    pub fn into_params(self) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    pub job_id: String,
    pub message: &'static str,
}

/// Response for a status check or an in-progress result poll
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    pub job_id: String,
    pub message: &'static str,
}

/// Response for a completed job
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub status: &'static str,
    pub job_id: String,
    pub result: String,
    pub metrics: JobMetrics,
}

/// Response for a failed job
#[derive(Debug, Serialize)]
pub struct FailedResponse {
    pub status: &'static str,
    pub job_id: String,
    pub error_message: String,
    pub error_kind: String,
}

/// Response for the health check
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue_connected: bool,
    pub backend_ready: bool,
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            user_id: None,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(request("hello").validate().is_ok());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert!(request("").validate().is_err());
    }

    #[test]
    fn test_oversized_prompt_rejected() {
        let long = "a".repeat(MAX_PROMPT_CHARS + 1);
        assert!(request(&long).validate().is_err());
    }

    #[test]
    fn test_sampling_bounds() {
        let mut req = request("hi");
        req.temperature = 2.5;
        assert!(req.validate().is_err());

        let mut req = request("hi");
        req.top_p = -0.1;
        assert!(req.validate().is_err());

        let mut req = request("hi");
        req.max_tokens = MAX_TOKENS_LIMIT + 1;
        assert!(req.validate().is_err());

        let mut req = request("hi");
        req.max_tokens = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_deserialization_fills_defaults() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt": "hello"}"#).unwrap();
        assert_eq!(req.max_tokens, 512);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!((req.top_p - 0.9).abs() < f32::EPSILON);
        assert!(req.user_id.is_none());
    }
}
