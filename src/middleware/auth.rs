//! API Key authentication middleware

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use serde::Serialize;
use std::{
    collections::HashSet,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

/// Marker used as the rate-limit identity for requests without a credential.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// The caller identity resolved by the auth middleware.
///
/// Inserted as a request extension so handlers can bind admission control
/// and submission metrics to the credential that made the call.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Authentication error response
#[derive(Serialize)]
struct AuthError {
    error: AuthErrorDetail,
}

#[derive(Serialize)]
struct AuthErrorDetail {
    message: String,
    r#type: String,
    code: String,
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    api_keys: Arc<HashSet<String>>,
    enabled: bool,
}

impl AuthLayer {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys.into_iter().collect()),
            enabled: true,
        }
    }

    /// Build a layer that resolves identities but never rejects.
    pub fn disabled() -> Self {
        Self {
            api_keys: Arc::new(HashSet::new()),
            enabled: false,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            api_keys: self.api_keys.clone(),
            enabled: self.enabled,
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    api_keys: Arc<HashSet<String>>,
    enabled: bool,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        // Health, metrics and the info root carry no credential.
        let path = request.uri().path();
        if path == "/" || path == "/health" || path == "/metrics" {
            let future = self.inner.call(request);
            return Box::pin(async move { future.await });
        }

        // Extract API key from Authorization header
        let api_key = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.trim_start_matches("Bearer ").to_string());

        // If auth is disabled or no API keys are configured, allow all
        // requests but still resolve an identity for admission control.
        if !self.enabled || self.api_keys.is_empty() {
            let identity = api_key.unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string());
            request.extensions_mut().insert(CallerIdentity(identity));
            let future = self.inner.call(request);
            return Box::pin(async move { future.await });
        }

        // Validate API key
        match api_key {
            Some(key) if self.api_keys.contains(&key) => {
                request.extensions_mut().insert(CallerIdentity(key));
                let future = self.inner.call(request);
                Box::pin(async move { future.await })
            }
            Some(_) => {
                warn!("Invalid API key provided");
                Box::pin(async move { Ok(create_auth_error_response("Invalid API key")) })
            }
            None => {
                warn!("No API key provided");
                Box::pin(async move {
                    Ok(create_auth_error_response(
                        "API key required. Provide via Authorization header: 'Bearer YOUR_API_KEY'",
                    ))
                })
            }
        }
    }
}

fn create_auth_error_response(message: &str) -> Response {
    let error = AuthError {
        error: AuthErrorDetail {
            message: message.to_string(),
            r#type: "authentication_error".to_string(),
            code: "invalid_api_key".to_string(),
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_layer_creation() {
        let layer = AuthLayer::new(vec!["test-key".to_string()]);
        assert!(layer.api_keys.contains("test-key"));
        assert!(layer.enabled);
    }

    #[test]
    fn test_disabled_layer_has_no_keys() {
        let layer = AuthLayer::disabled();
        assert!(layer.api_keys.is_empty());
        assert!(!layer.enabled);
    }
}
