//! Servicekit reference server.
//!
//! Serves the admin REST surface behind basic authentication and the
//! policy engine. Configuration comes from `servicekit.yml` and
//! `SERVICEKIT_*` environment variables:
//!
//! ```yaml
//! port: 8080
//! log_level: info
//! policy_file: /var/lib/servicekit/policy.csv
//! users:
//!   root: "$argon2id$v=19$m=19456,t=2,p=1$..."
//! seed:
//!   user_groups:
//!     - { entity: root, group: admin }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use serde::Deserialize;
use tracing::{info, Instrument};

use servicekit_core::prelude::*;

const SERVICE_NAME: &str = "servicekit";

#[derive(Debug, Deserialize)]
struct ServerConfig {
    #[serde(flatten)]
    base: BaseConfig,

    /// CSV file backing the policy engine
    policy_file: String,

    /// Username to argon2 PHC hash
    #[serde(default)]
    users: HashMap<String, String>,

    /// Rows for a fresh policy store
    #[serde(default)]
    seed: Seed,
}

impl HasBaseConfig for ServerConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.policy_file.trim().is_empty() {
            errors.push("Field 'policy_file' is required".to_string());
        }
        if self.base.production_environment && self.users.is_empty() {
            errors.push("Field 'users' must not be empty in production".to_string());
        }
        errors
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config: ServerConfig = ConfigLoader::new(SERVICE_NAME)
        .default("policy_file", "policy.csv")
        .load()?;

    let root = init_logging(&LoggingConfig::from_base(
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        &config.base,
    ))?;

    run(config, root.clone()).instrument(root).await
}

async fn run(config: ServerConfig, root: tracing::Span) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        production = config.base.production_environment,
        "Starting servicekit server"
    );

    let engine = CasbinEngine::from_file(&config.policy_file).await?;
    let auth = AuthModule::builder(Arc::new(engine))
        .seed(config.seed)
        .init()
        .await?;
    info!(policy_file = %config.policy_file, "Policy store loaded");

    let credentials = StaticCredentials::new(config.users);
    info!(users = credentials.len(), "Credentials loaded");

    let routes = Router::new().nest("/admin", admin_router(auth.clone()));
    let app = build_router(
        routes,
        Some(Security::new(credentials, &auth)),
        TracingLayer::default().with_parent(root.clone()),
    );

    serve(app, config.base.port, root).await
}
