//! Common traits and types for text generation backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The prompt to generate text from
    pub prompt: String,

    /// Upper bound on generated tokens
    pub max_tokens: u32,

    /// Sampling temperature, passed through uninterpreted
    pub temperature: f32,

    /// Nucleus sampling parameter, passed through uninterpreted
    pub top_p: f32,
}

/// Output of a successful generation call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Generation {
    /// Generated text
    pub text: String,

    /// Number of tokens in the prompt
    pub prompt_tokens: u32,

    /// Number of tokens generated
    pub completion_tokens: u32,
}

/// Typed failure of a backend execution.
///
/// Variants keep the upstream distinction (connect vs timeout vs status),
/// while [`BackendError::kind`] collapses onto the externally visible
/// error-kind vocabulary.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend failed to initialize: {0}")]
    Load(String),

    #[error("Backend timed out: {0}")]
    Timeout(String),

    #[error("Cannot connect to backend: {0}")]
    Connect(String),

    #[error("Backend returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Generation failed: {0}")]
    Generation(String),
}

impl BackendError {
    /// The externally visible error kind for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Load(_) => "BackendLoadError",
            BackendError::Timeout(_) => "BackendTimeout",
            BackendError::Connect(_)
            | BackendError::Status { .. }
            | BackendError::Generation(_) => "BackendError",
        }
    }
}

/// Trait for text generation backends
///
/// Implementations must be thread-safe (Send + Sync) for dynamic dispatch
/// via `Arc<dyn GenerationBackend>` across worker tasks. The variant is
/// selected by configuration at startup, never by runtime inspection.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Generate text for a request
    async fn generate(&self, request: &GenerationRequest)
        -> Result<Generation, BackendError>;

    /// Check whether the backend is ready to serve
    async fn readiness(&self) -> bool;
}
