//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub queue: QueueConfig,
    pub streaming: StreamingConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rpm() -> u32 {
    60
}

fn default_burst() -> u32 {
    10
}

/// Job queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Maximum number of jobs waiting for a worker
    #[serde(default = "default_queue_size")]
    pub max_queue_size: usize,
    /// Maximum number of jobs executing concurrently
    #[serde(default = "default_concurrency")]
    pub max_concurrent: usize,
    /// Hard deadline for a single backend execution, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// How long terminal job records are retained before eviction, in seconds
    #[serde(default = "default_result_ttl")]
    pub result_ttl_secs: u64,
}

fn default_queue_size() -> usize {
    1000
}

fn default_concurrency() -> usize {
    1
}

fn default_timeout() -> u64 {
    120
}

fn default_result_ttl() -> u64 {
    3600
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_queue_size(),
            max_concurrent: default_concurrency(),
            timeout_secs: default_timeout(),
            result_ttl_secs: default_result_ttl(),
        }
    }
}

/// Progress streaming configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Interval between status polls for an open stream, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Generation backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend variant: "local" (in-process engine) or "remote" (HTTP service)
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Engine selector for the local backend
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Model identifier passed to the backend
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the remote text-generation service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_kind() -> String {
    "local".to_string()
}

fn default_engine() -> String {
    "echo".to_string()
}

fn default_model() -> String {
    "qwen3:0.6b".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for the request and error log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("auth.enabled", true)?
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.requests_per_minute", 60)?
            .set_default("rate_limit.burst_size", 10)?
            // Load from configuration file
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with LLM_GATEWAY_)
            .add_source(
                Environment::with_prefix("LLM_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if !["local", "remote"].contains(&self.backend.kind.as_str()) {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "Invalid backend kind '{}'. Must be 'local' or 'remote'",
                self.backend.kind
            ))));
        }

        if self.backend.kind == "remote" && self.backend.base_url.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Remote backend requires a base_url".to_string(),
            )));
        }

        if self.rate_limit.burst_size == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "rate_limit.burst_size must be at least 1".to_string(),
            )));
        }

        if self.queue.max_concurrent == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "queue.max_concurrent must be at least 1".to_string(),
            )));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            auth: AuthConfig {
                enabled: true,
                api_keys: vec![],
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_minute: default_rpm(),
                burst_size: default_burst(),
            },
            queue: QueueConfig::default(),
            streaming: StreamingConfig::default(),
            backend: BackendConfig {
                kind: default_kind(),
                engine: default_engine(),
                model: default_model(),
                base_url: default_base_url(),
                connect_timeout_secs: default_connect_timeout(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
                dir: default_log_dir(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8000);
        assert!(settings.auth.enabled);
        assert!(settings.rate_limit.enabled);
        assert_eq!(settings.rate_limit.requests_per_minute, 60);
        assert_eq!(settings.rate_limit.burst_size, 10);
        assert_eq!(settings.queue.timeout_secs, 120);
    }

    #[test]
    fn test_validate_rejects_bad_backend_kind() {
        let mut settings = Settings::default();
        settings.backend.kind = "grpc".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_burst() {
        let mut settings = Settings::default();
        settings.rate_limit.burst_size = 0;
        assert!(settings.validate().is_err());
    }
}
