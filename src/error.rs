//! Common error types for the inference gateway

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded {
        /// Seconds until the next request would be admitted.
        retry_after: f64,
    },

    #[error("Queue unavailable: {0}")]
    SubstrateUnavailable(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response format (OpenAI compatible)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                Some("invalid_json"),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                Some("validation_error"),
            ),
            AppError::AuthenticationFailed(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                Some("invalid_api_key"),
            ),
            AppError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                Some("rate_limit_exceeded"),
            ),
            AppError::SubstrateUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server_error",
                Some("queue_unavailable"),
            ),
            AppError::UnknownJob(_) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                Some("unknown_job"),
            ),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let retry_after = match &self {
            AppError::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
                retry_after,
            },
        });

        let mut response = (status, body).into_response();

        if let Some(secs) = retry_after {
            // Retry-After is integer seconds; round up so clients never retry early.
            let value = secs.ceil().max(1.0) as u64;
            if let Ok(header) = HeaderValue::from_str(&value.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, header);
            }
        }

        response
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
