//! Group-based authorization.
//!
//! This module provides:
//! - **Models**: memberships, policies, entity kinds and the reserved names
//! - **Group Manager**: one generic manager for user groups and resource groups
//! - **Policy Manager**: `(user group, resource group, action)` grants
//! - **Bootstrap**: admin policy and admin membership seeding
//! - **Authorization Middleware**: per-request enforcement against the engine
//!
//! # Usage
//!
//! ```rust,ignore
//! use servicekit_core::rbac::AuthModule;
//!
//! let auth = AuthModule::from_file("policy.csv").await?;
//!
//! auth.create_user_group("team1").await?;
//! auth.add_user_to_group("alice", &["team1"]).await?;
//! auth.create_resource_group("docs").await?;
//! auth.add_resource_to_group("/docs", &["docs"]).await?;
//! auth.add_policy("team1", "docs", "GET").await?;
//!
//! let app = Router::new()
//!     .route("/docs", get(list_docs))
//!     .layer(auth.authz_layer())
//!     .layer(AuthLayer::new(credentials));
//! ```

pub mod bootstrap;
pub mod groups;
pub mod middleware;
pub mod models;
pub mod policy;

pub use bootstrap::{bootstrap, Seed};
pub use groups::GroupManager;
pub use middleware::{AuthzLayer, AuthzService};
pub use models::{
    EntityKind, Group, Membership, Policy, ResourceKind, UserKind, ADMIN_GROUP, NULL_RESOURCE,
    NULL_USER, UNAUTHENTICATED_USER, WILDCARD,
};
pub use policy::PolicyManager;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::{CasbinEngine, PolicyEngine};
use crate::error::{AuthzError, Result};

/// Manager for user groups.
pub type UserGroups = GroupManager<UserKind>;

/// Manager for resource groups.
pub type ResourceGroups = GroupManager<ResourceKind>;

// ═══════════════════════════════════════════════════════════════════════════════
// Auth Module
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared handle over one policy engine and the managers built on it.
///
/// Cloning is cheap; every clone talks to the same engine.
#[derive(Clone)]
pub struct AuthModule {
    engine: Arc<dyn PolicyEngine>,
    users: UserGroups,
    resources: ResourceGroups,
    policies: PolicyManager,
}

impl AuthModule {
    /// Bootstrap `engine` and wrap it.
    pub async fn init(engine: Arc<dyn PolicyEngine>) -> Result<Self> {
        Self::builder(engine).init().await
    }

    pub fn builder(engine: Arc<dyn PolicyEngine>) -> AuthModuleBuilder {
        AuthModuleBuilder { engine, seed: None }
    }

    /// Engine without persistence. Mostly useful in tests.
    pub async fn in_memory() -> Result<Self> {
        let engine = CasbinEngine::in_memory()
            .await
            .map_err(AuthzError::engine("create engine"))?;
        Self::init(Arc::new(engine)).await
    }

    /// Engine persisted to a CSV policy file, created when missing.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let engine = CasbinEngine::from_file(path)
            .await
            .map_err(AuthzError::engine("open policy file"))?;
        Self::init(Arc::new(engine)).await
    }

    fn wrap(engine: Arc<dyn PolicyEngine>) -> Self {
        Self {
            users: GroupManager::new(engine.clone()),
            resources: GroupManager::new(engine.clone()),
            policies: PolicyManager::new(engine.clone()),
            engine,
        }
    }

    pub fn users(&self) -> &UserGroups {
        &self.users
    }

    pub fn resources(&self) -> &ResourceGroups {
        &self.resources
    }

    pub fn policies(&self) -> &PolicyManager {
        &self.policies
    }

    pub fn engine(&self) -> Arc<dyn PolicyEngine> {
        self.engine.clone()
    }

    /// Authorization layer bound to this module's engine.
    pub fn authz_layer(&self) -> AuthzLayer {
        AuthzLayer::new(self.engine.clone())
    }

    /// Would `user` be allowed to perform `action` on `resource`?
    pub async fn enforce(&self, user: &str, resource: &str, action: &str) -> Result<bool> {
        self.engine
            .enforce(user, resource, action)
            .await
            .map_err(AuthzError::engine("enforce"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // User groups
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_user_group(&self, name: &str) -> Result<()> {
        self.users.create_group(name).await
    }

    pub async fn remove_user_group(&self, name: &str) -> Result<()> {
        self.users.remove_group(name).await
    }

    pub async fn add_user_to_group(&self, user: &str, groups: &[&str]) -> Result<()> {
        self.users.add_to_group(user, groups).await
    }

    pub async fn remove_user_from_group(&self, user: &str, groups: &[&str]) -> Result<()> {
        self.users.remove_from_group(user, groups).await
    }

    pub async fn remove_user(&self, user: &str) -> Result<()> {
        self.users.remove_entity(user).await
    }

    pub async fn get_groups_for_user(&self, user: &str) -> Result<Vec<String>> {
        self.users.groups_for_entity(user).await
    }

    pub async fn get_users_in_group(&self, group: &str) -> Result<Vec<String>> {
        self.users.entities_in_group(group).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resource groups
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_resource_group(&self, name: &str) -> Result<()> {
        self.resources.create_group(name).await
    }

    pub async fn remove_resource_group(&self, name: &str) -> Result<()> {
        self.resources.remove_group(name).await
    }

    pub async fn add_resource_to_group(&self, resource: &str, groups: &[&str]) -> Result<()> {
        self.resources.add_to_group(resource, groups).await
    }

    pub async fn remove_resource_from_group(&self, resource: &str, groups: &[&str]) -> Result<()> {
        self.resources.remove_from_group(resource, groups).await
    }

    pub async fn remove_resource(&self, resource: &str) -> Result<()> {
        self.resources.remove_entity(resource).await
    }

    pub async fn get_groups_for_resource(&self, resource: &str) -> Result<Vec<String>> {
        self.resources.groups_for_entity(resource).await
    }

    pub async fn get_resources_in_group(&self, group: &str) -> Result<Vec<String>> {
        self.resources.entities_in_group(group).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Policies
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn add_policy(&self, user_group: &str, resource_group: &str, action: &str) -> Result<()> {
        self.policies.add_policy(user_group, resource_group, action).await
    }

    pub async fn remove_policy(
        &self,
        user_group: &str,
        resource_group: &str,
        action: &str,
    ) -> Result<()> {
        self.policies.remove_policy(user_group, resource_group, action).await
    }

    pub async fn list_policies(&self) -> Result<Vec<Policy>> {
        self.policies.list_policies().await
    }
}

/// Builder for [`AuthModule`] when default rows are needed.
pub struct AuthModuleBuilder {
    engine: Arc<dyn PolicyEngine>,
    seed: Option<Seed>,
}

impl AuthModuleBuilder {
    /// Rows written into each table that is still empty at startup.
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    pub async fn init(self) -> Result<AuthModule> {
        bootstrap(self.engine.as_ref(), self.seed.as_ref()).await?;
        info!("Authorization module initialized");
        Ok(AuthModule::wrap(self.engine))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════════════════════════════════════════

/// Flush the engine to storage.
///
/// Engine mutations are applied in memory before this runs. When the flush
/// fails the engine is reloaded from storage, so memory never holds rows the
/// store does not and a retried write is not mistaken for a no-op.
pub(crate) async fn persist(engine: &dyn PolicyEngine) -> Result<()> {
    let Err(source) = engine.save_policy().await else {
        return Ok(());
    };

    if let Err(reload) = engine.load_policy().await {
        warn!(error = %reload, "Reload after failed save also failed");
    }
    Err(AuthzError::engine("save policy")(source))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
