//! HTTP layer.
//!
//! [`build_router`] wraps a service's routes in the shared middleware stack.
//! Requests pass through the layers outside in:
//!
//! ```text
//! CORS -> request logging -> authentication -> authorization -> handler
//! ```
//!
//! `GET /health` is mounted outside authentication and authorization so
//! probes never need credentials.
//!
//! [`admin_router`] exposes the group and policy managers over REST; mount it
//! inside the routes passed to `build_router` so it is protected like every
//! other endpoint.

pub mod admin;
mod handlers;

pub use admin::admin_router;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::middleware::{AuthLayer, BasicAuthenticator, TracingLayer};
use crate::rbac::{AuthModule, AuthzLayer};

/// Authentication and authorization applied to the service routes.
#[derive(Clone)]
pub struct Security {
    authenticator: Arc<dyn BasicAuthenticator>,
    authz: AuthzLayer,
}

impl Security {
    pub fn new(authenticator: impl BasicAuthenticator + 'static, auth: &AuthModule) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            authz: auth.authz_layer(),
        }
    }
}

/// Build the service router.
///
/// Without `security` the routes are served unauthenticated, which is only
/// meant for local development.
///
/// # Example
///
/// ```rust,ignore
/// let auth = AuthModule::from_file("policy.csv").await?;
/// let routes = Router::new().nest("/admin", admin_router(auth.clone()));
/// let app = build_router(
///     routes,
///     Some(Security::new(credentials, &auth)),
///     TracingLayer::default(),
/// );
/// ```
pub fn build_router(
    routes: Router,
    security: Option<Security>,
    request_logging: TracingLayer,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = match security {
        Some(security) => routes
            .layer(security.authz)
            .layer(AuthLayer::from_arc(security.authenticator)),
        None => {
            tracing::warn!("Serving routes without authentication");
            routes
        }
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protected)
        .layer(request_logging)
        .layer(cors)
}

/// API response wrapper.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn error_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: Some(code.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, Some("test data"));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error_skips_data() {
        let response: ApiResponse<()> = ApiResponse::error_with_code("missing", "NOT_FOUND");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "missing", "error_code": "NOT_FOUND"})
        );
    }
}
