//! Backend module - generation contract, local engine and remote client

pub mod local;
pub mod remote;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{AppError, Result};
use local::{EchoLoader, LocalBackend};
use remote::RemoteBackend;
use traits::GenerationBackend;

/// Build the configured backend variant.
///
/// Selection happens once at startup; the rest of the system only sees
/// `Arc<dyn GenerationBackend>`.
pub fn build_backend(
    config: &BackendConfig,
    execution_timeout: Duration,
) -> Result<Arc<dyn GenerationBackend>> {
    match config.kind.as_str() {
        "local" => match config.engine.as_str() {
            "echo" => Ok(Arc::new(LocalBackend::new(
                "local",
                Arc::new(EchoLoader::new()),
            ))),
            other => Err(AppError::Config(config::ConfigError::Message(format!(
                "Unknown local engine '{}'. Only 'echo' is built in",
                other
            )))),
        },
        "remote" => Ok(Arc::new(RemoteBackend::new(config, execution_timeout)?)),
        other => Err(AppError::Config(config::ConfigError::Message(format!(
            "Unknown backend kind '{}'",
            other
        )))),
    }
}
