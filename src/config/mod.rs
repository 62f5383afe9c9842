//! Configuration module - settings loading and validation

pub mod settings;

pub use settings::{
    AuthConfig, BackendConfig, LoggingConfig, QueueConfig, RateLimitConfig, ServerConfig,
    Settings, StreamingConfig,
};
