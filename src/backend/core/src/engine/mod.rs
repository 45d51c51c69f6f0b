//! Policy engine abstraction.
//!
//! The group and policy managers never talk to a concrete engine. They go
//! through [`PolicyEngine`], which stores two kinds of rows:
//!
//! - **Policies**: `(user group, resource group, action)` triples.
//! - **Relations**: `(entity, group)` memberships, one table per
//!   [`RelationKind`].
//!
//! plus the `enforce` decision and explicit load/save against the backing
//! storage. [`CasbinEngine`] is the production implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use servicekit_core::engine::{CasbinEngine, PolicyEngine};
//!
//! let engine = CasbinEngine::from_file("policies.csv").await?;
//! let allowed = engine.enforce("alice", "/docs", "GET").await?;
//! ```

mod enforcer;

pub use enforcer::{CasbinEngine, MODEL};

use async_trait::async_trait;
use thiserror::Error;

use crate::rbac::models::{Membership, Policy};

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures raised by a policy engine or its storage adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Casbin(#[from] ::casbin::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Row addressing
// ═══════════════════════════════════════════════════════════════════════════════

/// The two grouping relations kept by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// user -> user group
    UserGrouping,
    /// resource -> resource group
    ResourceGrouping,
}

impl RelationKind {
    /// Section name of the relation in the engine model.
    pub fn ptype(&self) -> &'static str {
        match self {
            Self::UserGrouping => "g",
            Self::ResourceGrouping => "g2",
        }
    }
}

/// Column of a relation row used for filtered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationField {
    Entity,
    Group,
}

impl RelationField {
    pub fn index(&self) -> usize {
        match self {
            Self::Entity => 0,
            Self::Group => 1,
        }
    }
}

/// Column of a policy row used for filtered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyField {
    Subject,
    Object,
    Action,
}

impl PolicyField {
    pub fn index(&self) -> usize {
        match self {
            Self::Subject => 0,
            Self::Object => 1,
            Self::Action => 2,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Engine contract
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage-backed policy evaluation engine.
///
/// Mutations report whether anything changed. They do not persist on their
/// own; callers flush with [`PolicyEngine::save_policy`].
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Reload all rows from the storage adapter.
    async fn load_policy(&self) -> EngineResult<()>;

    /// Flush all rows to the storage adapter.
    async fn save_policy(&self) -> EngineResult<()>;

    /// Decide whether `subject` may perform `action` on `object`.
    async fn enforce(&self, subject: &str, object: &str, action: &str) -> EngineResult<bool>;

    async fn policies(&self) -> EngineResult<Vec<Policy>>;

    async fn filtered_policies(&self, field: PolicyField, value: &str)
        -> EngineResult<Vec<Policy>>;

    async fn has_policy(&self, policy: &Policy) -> EngineResult<bool>;

    async fn add_policy(&self, policy: &Policy) -> EngineResult<bool>;

    async fn remove_policy(&self, policy: &Policy) -> EngineResult<bool>;

    async fn remove_filtered_policies(&self, field: PolicyField, value: &str)
        -> EngineResult<bool>;

    async fn relations(&self, kind: RelationKind) -> EngineResult<Vec<Membership>>;

    async fn filtered_relations(
        &self,
        kind: RelationKind,
        field: RelationField,
        value: &str,
    ) -> EngineResult<Vec<Membership>>;

    /// Insert every row in one call. Rows must not already exist.
    async fn add_relations(&self, kind: RelationKind, rows: &[Membership]) -> EngineResult<bool>;

    /// Delete every row in one call. Rows must exist.
    async fn remove_relations(&self, kind: RelationKind, rows: &[Membership])
        -> EngineResult<bool>;

    async fn remove_filtered_relations(
        &self,
        kind: RelationKind,
        field: RelationField,
        value: &str,
    ) -> EngineResult<bool>;
}
