//! Local in-process generation backend
//!
//! The concrete inference runtime lives behind [`InferenceEngine`]; this
//! module owns the engine lifecycle: one guarded load per worker process,
//! a cached handle shared by every execution, and the distinction between
//! load failures and generation failures.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::backend::traits::{BackendError, Generation, GenerationBackend, GenerationRequest};

/// An in-process text generation engine.
///
/// This is the boundary to the neural runtime proper; the gateway treats
/// it as opaque and only drives it through this trait.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Human-readable engine identifier (model name or similar)
    fn describe(&self) -> &str;

    /// Run one generation call
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, String>;
}

/// Constructs an [`InferenceEngine`] once per worker process.
///
/// Loading may be slow (weights, device placement); the [`LocalBackend`]
/// guards it with a one-time-init cell so concurrent first submissions
/// trigger exactly one load.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn InferenceEngine>, String>;
}

/// Local backend owning the cached engine handle
pub struct LocalBackend {
    name: String,
    loader: Arc<dyn EngineLoader>,
    engine: OnceCell<Arc<dyn InferenceEngine>>,
}

impl LocalBackend {
    pub fn new(name: impl Into<String>, loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            name: name.into(),
            loader,
            engine: OnceCell::new(),
        }
    }

    /// Get the cached engine, loading it on first use.
    ///
    /// A failed load leaves the cell empty, so a later submission retries
    /// instead of pinning the worker to a dead handle.
    async fn engine(&self) -> Result<&Arc<dyn InferenceEngine>, BackendError> {
        self.engine
            .get_or_try_init(|| async {
                info!(backend = %self.name, "Loading inference engine");
                let engine = self.loader.load().await.map_err(BackendError::Load)?;
                info!(backend = %self.name, engine = %engine.describe(), "Engine loaded");
                Ok(engine)
            })
            .await
    }

    /// Whether the engine handle has been loaded.
    pub fn engine_loaded(&self) -> bool {
        self.engine.initialized()
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        let engine = self.engine().await?;

        debug!(
            backend = %self.name,
            engine = %engine.describe(),
            prompt_chars = request.prompt.len(),
            "Running local generation"
        );

        engine
            .generate(request)
            .await
            .map_err(BackendError::Generation)
    }

    async fn readiness(&self) -> bool {
        self.engine_loaded()
    }
}

// ── Echo engine ────────────────────────────────────────────────────────────

/// Reference engine that echoes the prompt back as whitespace tokens.
///
/// Useful for end-to-end smoke runs without model weights: token counting,
/// the `max_tokens` bound and generation latency all behave like a real
/// engine, just with trivial output.
pub struct EchoEngine {
    delay: Duration,
}

impl EchoEngine {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for EchoEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEngine for EchoEngine {
    fn describe(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, String> {
        tokio::time::sleep(self.delay).await;

        let words: Vec<&str> = request.prompt.split_whitespace().collect();
        let prompt_tokens = words.len() as u32;

        let completion: Vec<&str> = words
            .into_iter()
            .take(request.max_tokens as usize)
            .collect();

        Ok(Generation {
            completion_tokens: completion.len() as u32,
            text: completion.join(" "),
            prompt_tokens,
        })
    }
}

/// Loader producing an [`EchoEngine`]
pub struct EchoLoader {
    delay: Duration,
}

impl EchoLoader {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
        }
    }
}

impl Default for EchoLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineLoader for EchoLoader {
    async fn load(&self) -> Result<Arc<dyn InferenceEngine>, String> {
        Ok(Arc::new(EchoEngine::with_delay(self.delay)))
    }
}
