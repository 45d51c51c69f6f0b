//! Axum authorization middleware backed by the policy engine.
//!
//! This middleware reads the `AuthContext` (injected by the auth middleware)
//! and asks the engine whether `(identity, path, method)` is allowed. Every
//! request is evaluated; nothing is cached.

use axum::{
    body::Body,
    extract::{OriginalUri, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use metrics::counter;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::models::UNAUTHENTICATED_USER;
use crate::engine::PolicyEngine;
use crate::middleware::auth::AuthContext;

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that gates every request on an engine decision.
///
/// Must sit inside (run after) [`crate::middleware::AuthLayer`]. Requests
/// without an `AuthContext` are evaluated as the unauthenticated identity.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/docs", get(list_docs))
///     .layer(AuthzLayer::new(auth.engine()))
///     .layer(AuthLayer::new(authenticator));
/// ```
#[derive(Clone)]
pub struct AuthzLayer {
    engine: Arc<dyn PolicyEngine>,
}

impl AuthzLayer {
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for AuthzLayer {
    type Service = AuthzService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthzService {
            inner,
            engine: self.engine.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct AuthzService<S> {
    inner: S,
    engine: Arc<dyn PolicyEngine>,
}

impl<S> Service<Request<Body>> for AuthzService<S>
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

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let engine = self.engine.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let identity = request
                .extensions()
                .get::<AuthContext>()
                .map(|ctx| ctx.user_id.clone())
                .unwrap_or_else(|| UNAUTHENTICATED_USER.to_string());

            // Nested routers see a stripped URI; policies are written against
            // the full path.
            let path = request
                .extensions()
                .get::<OriginalUri>()
                .map(|uri| uri.0.path().to_string())
                .unwrap_or_else(|| request.uri().path().to_string());
            let method = request.method().as_str().to_string();

            match engine.enforce(&identity, &path, &method).await {
                Ok(true) => {
                    debug!(user_id = %identity, path = %path, method = %method, "Request authorized");
                    counter!("authz_decisions_total", "decision" => "allow").increment(1);
                    inner.call(request).await
                }
                Ok(false) => {
                    warn!(user_id = %identity, path = %path, method = %method, "Permission denied");
                    counter!("authz_decisions_total", "decision" => "deny").increment(1);
                    Ok(forbidden_response(&format!(
                        "{} may not {} {}",
                        identity, method, path
                    )))
                }
                Err(e) => {
                    error!(user_id = %identity, path = %path, method = %method, error = %e, "Policy enforcement failed");
                    counter!("authz_decisions_total", "decision" => "error").increment(1);
                    Ok(engine_error_response())
                }
            }
        })
    }
}

/// Build a 403 Forbidden JSON response.
fn forbidden_response(message: &str) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": message,
        "error_code": "FORBIDDEN",
    });
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

fn engine_error_response() -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": "Authorization could not be evaluated",
        "error_code": "ENGINE_ERROR",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
