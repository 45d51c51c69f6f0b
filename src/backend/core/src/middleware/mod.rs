//! HTTP middleware: authentication and request logging.
//!
//! Authorization lives in [`crate::rbac::AuthzLayer`] because it needs the
//! policy engine.

pub mod auth;
pub mod tracing;

pub use auth::{
    authenticate, basic_credentials, AuthContext, AuthError, AuthLayer, AuthMethod, AuthService,
    BasicAuthenticator, StaticCredentials,
};
pub use tracing::{RequestContext, TracingConfig, TracingLayer, TracingService};
