//! Queue-Mediated LLM Inference Gateway
//!
//! Clients submit generation requests, receive an opaque job handle
//! immediately, and later poll or stream for status and result. Jobs run
//! on an in-process worker pool against a configurable generation backend
//! (local engine or remote HTTP service), with per-identity admission
//! control, per-stage latency accounting, and Prometheus metrics.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod queue;
pub mod streaming;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::traits::GenerationBackend;
use metrics::MetricsRegistry;
use middleware::rate_limit::RateLimiter;
use queue::JobQueue;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: config::Settings,
    pub backend: Arc<dyn GenerationBackend>,
    pub queue: Arc<JobQueue>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRegistry>,
}
