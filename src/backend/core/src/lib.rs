#![allow(clippy::result_large_err)]
//! # Servicekit Core
//!
//! Shared boilerplate for HTTP microservices.
//!
//! ## Architecture
//!
//! - **Config**: layered YAML/environment configuration with validation
//! - **Telemetry**: JSON or pretty structured logging with a service root span
//! - **Middleware**: basic authentication and request logging
//! - **RBAC**: user groups, resource groups and policies over a policy engine
//! - **Engine**: casbin-backed policy storage and enforcement
//! - **API**: router assembly, health check and the admin REST surface
//! - **Server**: bind and serve with graceful shutdown
//!
//! ## Quick start
//!
//! ```rust,ignore
//! let cfg: BaseConfig = ConfigLoader::new("docs").load()?;
//! let root = init_logging(&LoggingConfig::from_base("docs", "1.0.0", &cfg))?;
//!
//! let auth = AuthModule::from_file("policy.csv").await?;
//! let routes = Router::new()
//!     .route("/docs", get(list_docs))
//!     .nest("/admin", admin_router(auth.clone()));
//!
//! let app = build_router(
//!     routes,
//!     Some(Security::new(credentials, &auth)),
//!     TracingLayer::default().with_parent(root.clone()),
//! );
//! server::serve(app, cfg.port, root).await?;
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod rbac;
pub mod server;
pub mod telemetry;

pub use error::{AuthzError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{admin_router, build_router, ApiResponse, Security};
    pub use crate::config::{BaseConfig, ConfigError, ConfigLoader, HasBaseConfig};
    pub use crate::engine::{CasbinEngine, EngineError, PolicyEngine};
    pub use crate::error::{AuthzError, Result};
    pub use crate::middleware::{
        AuthContext, AuthError, AuthLayer, AuthMethod, BasicAuthenticator, StaticCredentials,
        TracingConfig, TracingLayer,
    };
    pub use crate::rbac::{
        AuthModule, AuthzLayer, Group, Membership, Policy, ResourceGroups, Seed, UserGroups,
        ADMIN_GROUP, NULL_RESOURCE, NULL_USER, UNAUTHENTICATED_USER, WILDCARD,
    };
    pub use crate::server::serve;
    pub use crate::telemetry::{init_logging, LoggingConfig};
}
