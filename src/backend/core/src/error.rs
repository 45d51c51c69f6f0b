//! Error handling for the authorization core.
//!
//! Every group and policy operation returns [`AuthzError`]. The variants map
//! onto stable machine-readable codes and HTTP statuses so the admin surface
//! can hand them straight back to clients:
//!
//! | Variant       | Code           | Status |
//! |---------------|----------------|--------|
//! | `NotFound`    | `NOT_FOUND`    | 404    |
//! | `Conflict`    | `CONFLICT`     | 409    |
//! | `InvalidName` | `INVALID_NAME` | 422    |
//! | `Engine`      | `ENGINE_ERROR` | 500    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, error};

use crate::api::ApiResponse;
use crate::engine::EngineError;

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for group and policy operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Type
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum AuthzError {
    /// A referenced group does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The operation would break a protection invariant.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// A name cannot be stored by the policy engine.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The policy engine or its storage adapter failed.
    #[error("policy engine failed to {action}: {source}")]
    Engine {
        action: &'static str,
        #[source]
        source: EngineError,
    },
}

impl AuthzError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Adapter for `map_err` that tags an engine failure with what was being
    /// attempted.
    ///
    /// ```rust,ignore
    /// engine.save_policy().await.map_err(AuthzError::engine("save policy"))?;
    /// ```
    pub fn engine(action: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |source| Self::Engine { action, source }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidName { .. } => "INVALID_NAME",
            Self::Engine { .. } => "ENGINE_ERROR",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidName { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Engine { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients. Engine internals stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Engine { .. } => "Internal policy engine error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Engine { .. })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let code = self.code();

        if self.is_server_error() {
            error!(error = %self, code, "Authorization operation failed");
        } else {
            debug!(error = %self, code, "Authorization request rejected");
        }

        counter!("authz_errors_total", "code" => code).increment(1);

        let body = ApiResponse::<()>::error_with_code(self.user_message(), code);
        (self.http_status(), Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
