//! Request logging middleware.
//!
//! Every request gets a span carrying its request ID, and one access-log
//! event once the response is ready:
//!
//! ```text
//! method, path (with query), client_ip, status, latency_ms, size, user_agent
//! ```
//!
//! Responses with status >= 400 are logged at `warn`, everything else at
//! `info`. The request ID is taken from `X-Request-ID` when the client sent
//! one, generated otherwise, and echoed back on the response.
//!
//! # Example
//!
//! ```rust,ignore
//! use servicekit_core::middleware::tracing::{TracingLayer, TracingConfig};
//!
//! let config = TracingConfig::builder()
//!     .add_excluded_path("/internal")
//!     .build();
//!
//! let app = Router::new()
//!     .route("/docs", get(list_docs))
//!     .layer(TracingLayer::new(config));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use futures::future::BoxFuture;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tower::{Layer, Service};
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Request logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Enable request logging
    pub enabled: bool,

    /// Path prefixes that are not logged
    pub excluded_paths: Vec<String>,

    /// Header name for request ID
    pub request_id_header: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            excluded_paths: vec!["/health".to_string()],
            request_id_header: "X-Request-ID".to_string(),
        }
    }
}

impl TracingConfig {
    /// Create a new builder.
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder::default()
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Builder for tracing configuration.
#[derive(Default)]
pub struct TracingConfigBuilder {
    config: TracingConfig,
}

impl TracingConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn add_excluded_path(mut self, path: impl Into<String>) -> Self {
        self.config.excluded_paths.push(path.into());
        self
    }

    pub fn clear_excluded_paths(mut self) -> Self {
        self.config.excluded_paths.clear();
        self
    }

    pub fn request_id_header(mut self, header: impl Into<String>) -> Self {
        self.config.request_id_header = header.into();
        self
    }

    pub fn build(self) -> TracingConfig {
        self.config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Request metadata captured before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request ID
    pub request_id: String,

    /// Client IP address
    pub client_ip: Option<String>,

    /// HTTP method
    pub method: String,

    /// Request path including the query string
    pub path: String,

    /// User agent
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_request(
        request: &Request<Body>,
        remote_addr: Option<SocketAddr>,
        config: &TracingConfig,
    ) -> Self {
        let headers = request.headers();

        let request_id = headers
            .get(&config.request_id_header)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let path = match request.uri().query() {
            Some(query) => format!("{}?{}", request.uri().path(), query),
            None => request.uri().path().to_string(),
        };

        Self {
            request_id,
            client_ip: extract_client_ip(headers, remote_addr),
            method: request.method().to_string(),
            path,
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        }
    }
}

/// Extract client IP from headers and connection.
fn extract_client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> Option<String> {
    for header_name in &["X-Forwarded-For", "X-Real-IP"] {
        if let Some(value) = headers.get(*header_name) {
            if let Ok(s) = value.to_str() {
                // X-Forwarded-For can have multiple IPs
                return Some(s.split(',').next().unwrap_or(s).trim().to_string());
            }
        }
    }

    remote_addr.map(|addr| addr.ip().to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Tracing layer for Tower.
#[derive(Clone)]
pub struct TracingLayer {
    config: Arc<TracingConfig>,
    parent: Option<Span>,
}

impl TracingLayer {
    pub fn new(config: TracingConfig) -> Self {
        Self {
            config: Arc::new(config),
            parent: None,
        }
    }

    /// Open every request span under `parent`, usually the service root span.
    pub fn with_parent(mut self, parent: Span) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl Default for TracingLayer {
    fn default() -> Self {
        Self::new(TracingConfig::default())
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            config: self.config.clone(),
            parent: self.parent.clone(),
        }
    }
}

/// Tracing service.
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    config: Arc<TracingConfig>,
    parent: Option<Span>,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let config = self.config.clone();
        let parent = self.parent.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !config.enabled || config.is_excluded(request.uri().path()) {
                return inner.call(request).await;
            }

            let start = Instant::now();

            let remote_addr = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0);
            let ctx = RequestContext::from_request(&request, remote_addr, &config);

            let span = match &parent {
                Some(parent) => info_span!(
                    parent: parent,
                    "http_request",
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    path = %ctx.path,
                ),
                None => info_span!(
                    "http_request",
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    path = %ctx.path,
                ),
            };

            request.extensions_mut().insert(ctx.clone());

            let result = inner.call(request).instrument(span.clone()).await;
            let latency = start.elapsed();

            match result {
                Ok(mut response) => {
                    if let Ok(header_name) =
                        header::HeaderName::from_bytes(config.request_id_header.as_bytes())
                    {
                        if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
                            response.headers_mut().insert(header_name, value);
                        }
                    }

                    let size = response
                        .headers()
                        .get(header::CONTENT_LENGTH)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(0);

                    log_access(&span, &ctx, response.status(), latency, size);
                    record_metrics(&ctx, response.status(), latency);

                    Ok(response)
                }
                Err(e) => {
                    error!(
                        parent: &span,
                        latency_ms = latency.as_millis() as u64,
                        "Request failed with internal error"
                    );
                    Err(e)
                }
            }
        })
    }
}

fn log_access(
    span: &Span,
    ctx: &RequestContext,
    status: StatusCode,
    latency: Duration,
    size: u64,
) {
    let status = status.as_u16();
    let latency_ms = latency.as_millis() as u64;
    let client_ip = ctx.client_ip.as_deref().unwrap_or("unknown");
    let user_agent = ctx.user_agent.as_deref().unwrap_or("");

    if status >= 400 {
        warn!(
            parent: span,
            method = %ctx.method,
            path = %ctx.path,
            ip = client_ip,
            status,
            latency_ms,
            size,
            user_agent,
            "Request completed"
        );
    } else {
        info!(
            parent: span,
            method = %ctx.method,
            path = %ctx.path,
            ip = client_ip,
            status,
            latency_ms,
            size,
            user_agent,
            "Request completed"
        );
    }
}

fn record_metrics(ctx: &RequestContext, status: StatusCode, latency: Duration) {
    let status = status.as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => ctx.method.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => ctx.method.clone(),
        "status" => status
    )
    .record(latency.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractor
// ═══════════════════════════════════════════════════════════════════════════════

/// Extractor for request context in handlers.
#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext {
                request_id: Uuid::new_v4().to_string(),
                client_ip: None,
                method: parts.method.to_string(),
                path: parts.uri.path().to_string(),
                user_agent: None,
            }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::builder()
            .add_excluded_path("/internal")
            .request_id_header("X-Correlation-ID")
            .build();

        assert!(config.enabled);
        assert!(config.is_excluded("/health"));
        assert!(config.is_excluded("/internal/stats"));
        assert!(!config.is_excluded("/admin/policies"));
        assert_eq!(config.request_id_header, "X-Correlation-ID");
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        let remote: SocketAddr = "192.168.1.1:4000".parse().unwrap();

        assert_eq!(
            extract_client_ip(&headers, Some(remote)),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(
            extract_client_ip(&HeaderMap::new(), Some(remote)),
            Some("192.168.1.1".to_string())
        );
    }

    #[test]
    fn test_context_keeps_query() {
        let request = Request::builder()
            .uri("/users/entity?name=alice")
            .body(Body::empty())
            .unwrap();
        let ctx = RequestContext::from_request(&request, None, &TracingConfig::default());
        assert_eq!(ctx.path, "/users/entity?name=alice");
        assert!(!ctx.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(TracingLayer::default());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("X-Request-ID", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-Request-ID").unwrap(), "req-42");
    }
}
