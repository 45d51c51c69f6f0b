//! Authentication middleware.
//!
//! Resolves the caller identity from HTTP Basic credentials and attaches it to
//! the request as an [`AuthContext`]:
//!
//! - No `Authorization` header: the request continues as the
//!   unauthenticated identity. Authorization decides what that may do.
//! - Credentials accepted: the request continues as the returned identity.
//! - Malformed header or rejected credentials: 401, the request stops here.
//!
//! # Example
//!
//! ```rust,ignore
//! use servicekit_core::middleware::auth::{AuthLayer, StaticCredentials};
//!
//! let credentials = StaticCredentials::new(config.users.clone());
//!
//! let app = Router::new()
//!     .route("/docs", get(list_docs))
//!     .layer(AuthLayer::new(credentials));
//! ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::future::BoxFuture;
use metrics::counter;
use std::{
    collections::HashMap,
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::rbac::models::{RESERVED_IDENTITIES, UNAUTHENTICATED_USER};

// ═══════════════════════════════════════════════════════════════════════════════
// Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed authorization header")]
    MalformedHeader,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Credentials resolved to reserved identity: {0}")]
    ReservedIdentity(String),

    #[error("Authentication context missing from request")]
    MissingContext,

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::MalformedHeader => (
                StatusCode::UNAUTHORIZED,
                "MALFORMED_CREDENTIALS",
                "The authorization header is not valid Basic credentials",
            ),
            Self::InvalidCredentials | Self::ReservedIdentity(_) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "The provided credentials are invalid",
            ),
            Self::MissingContext | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An authentication error occurred",
            ),
        };

        counter!(
            "auth_errors_total",
            "error_type" => code.to_string()
        )
        .increment(1);

        let mut response = (
            status,
            Json(serde_json::json!({
                "success": false,
                "error": message,
                "error_code": code,
            })),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Basic realm=\"servicekit\""),
            );
        }
        response
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authentication Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Caller identity attached to every request passing through [`AuthLayer`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Resolved identity, or the unauthenticated identity.
    pub user_id: String,

    /// Authentication method used
    pub auth_method: AuthMethod,

    /// Request ID for correlation
    pub request_id: String,
}

/// Authentication method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Basic,
    Anonymous,
}

impl AuthContext {
    pub fn authenticated(user_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            auth_method: AuthMethod::Basic,
            request_id: request_id.into(),
        }
    }

    /// Context for a request that presented no credentials.
    pub fn anonymous(request_id: impl Into<String>) -> Self {
        Self {
            user_id: UNAUTHENTICATED_USER.to_string(),
            auth_method: AuthMethod::Anonymous,
            request_id: request_id.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_method != AuthMethod::Anonymous
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authenticators
// ═══════════════════════════════════════════════════════════════════════════════

/// Credential check for HTTP Basic authentication.
///
/// Returns the identity to authorize the request as. Plain closures of shape
/// `Fn(&str, &str) -> Result<String, AuthError>` implement this trait.
#[async_trait]
pub trait BasicAuthenticator: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<String, AuthError>;
}

#[async_trait]
impl<F> BasicAuthenticator for F
where
    F: Fn(&str, &str) -> Result<String, AuthError> + Send + Sync,
{
    async fn authenticate(&self, username: &str, password: &str) -> Result<String, AuthError> {
        self(username, password)
    }
}

/// Fixed user table of argon2 PHC password hashes.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    /// Hash a password for storage in the user table.
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl BasicAuthenticator for StaticCredentials {
    async fn authenticate(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let stored = self
            .users
            .get(username)
            .ok_or(AuthError::InvalidCredentials)?;

        let parsed = PasswordHash::new(stored).map_err(|_| {
            warn!(user_id = %username, "Stored password hash is not a valid PHC string");
            AuthError::InvalidCredentials
        })?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;

        Ok(username.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Header parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract `(username, password)` from a Basic `Authorization` header.
///
/// `Ok(None)` when the header is absent.
pub fn basic_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))
        .ok_or(AuthError::MalformedHeader)?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::MalformedHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedHeader)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::MalformedHeader)?;

    Ok(Some((username.to_string(), password.to_string())))
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Resolve the context for a request, or the error that rejects it.
pub async fn authenticate(
    authenticator: &dyn BasicAuthenticator,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let request_id = request_id(headers);

    let Some((username, password)) = basic_credentials(headers)? else {
        return Ok(AuthContext::anonymous(request_id));
    };

    let identity = authenticator.authenticate(&username, &password).await?;
    if RESERVED_IDENTITIES.contains(&identity.as_str()) {
        return Err(AuthError::ReservedIdentity(identity));
    }

    counter!(
        "auth_success_total",
        "method" => "basic"
    )
    .increment(1);

    Ok(AuthContext::authenticated(identity, request_id))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<dyn BasicAuthenticator>,
}

impl AuthLayer {
    pub fn new(authenticator: impl BasicAuthenticator + 'static) -> Self {
        Self::from_arc(Arc::new(authenticator))
    }

    pub fn from_arc(authenticator: Arc<dyn BasicAuthenticator>) -> Self {
        Self { authenticator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<dyn BasicAuthenticator>,
}

impl<S> Service<Request<Body>> for AuthService<S>
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
        let authenticator = self.authenticator.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match authenticate(authenticator.as_ref(), request.headers()).await {
                Ok(auth_context) => {
                    debug!(
                        user_id = %auth_context.user_id,
                        authenticated = auth_context.is_authenticated(),
                        "Resolved caller identity"
                    );
                    request.extensions_mut().insert(auth_context);
                    inner.call(request).await
                }
                Err(e) => {
                    warn!(error = %e, path = %request.uri().path(), "Authentication failed");
                    Ok(e.into_response())
                }
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractor
// ═══════════════════════════════════════════════════════════════════════════════

/// Extractor for authentication context in handlers.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingContext)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
