//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use servicekit_core::engine::{
    CasbinEngine, EngineError, EngineResult, PolicyEngine, PolicyField, RelationField,
    RelationKind,
};
use servicekit_core::rbac::{Membership, Policy};

/// Engine that delegates to a casbin engine and fails saves, membership
/// removals or enforcement on demand.
pub struct FaultyEngine {
    inner: CasbinEngine,
    pub fail_save: AtomicBool,
    pub fail_enforce: AtomicBool,
    pub fail_remove_relations: AtomicBool,
}

impl FaultyEngine {
    pub async fn new() -> Self {
        Self::wrap(CasbinEngine::in_memory().await.unwrap())
    }

    pub async fn from_file(path: &Path) -> Self {
        Self::wrap(CasbinEngine::from_file(path).await.unwrap())
    }

    fn wrap(inner: CasbinEngine) -> Self {
        Self {
            inner,
            fail_save: AtomicBool::new(false),
            fail_enforce: AtomicBool::new(false),
            fail_remove_relations: AtomicBool::new(false),
        }
    }

    fn storage_error() -> EngineError {
        EngineError::Storage("disk unavailable".to_string())
    }
}

#[async_trait]
impl PolicyEngine for FaultyEngine {
    async fn load_policy(&self) -> EngineResult<()> {
        self.inner.load_policy().await
    }

    async fn save_policy(&self) -> EngineResult<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Self::storage_error());
        }
        self.inner.save_policy().await
    }

    async fn enforce(&self, subject: &str, object: &str, action: &str) -> EngineResult<bool> {
        if self.fail_enforce.load(Ordering::SeqCst) {
            return Err(Self::storage_error());
        }
        self.inner.enforce(subject, object, action).await
    }

    async fn policies(&self) -> EngineResult<Vec<Policy>> {
        self.inner.policies().await
    }

    async fn filtered_policies(&self, field: PolicyField, value: &str) -> EngineResult<Vec<Policy>> {
        self.inner.filtered_policies(field, value).await
    }

    async fn has_policy(&self, policy: &Policy) -> EngineResult<bool> {
        self.inner.has_policy(policy).await
    }

    async fn add_policy(&self, policy: &Policy) -> EngineResult<bool> {
        self.inner.add_policy(policy).await
    }

    async fn remove_policy(&self, policy: &Policy) -> EngineResult<bool> {
        self.inner.remove_policy(policy).await
    }

    async fn remove_filtered_policies(&self, field: PolicyField, value: &str) -> EngineResult<bool> {
        self.inner.remove_filtered_policies(field, value).await
    }

    async fn relations(&self, kind: RelationKind) -> EngineResult<Vec<Membership>> {
        self.inner.relations(kind).await
    }

    async fn filtered_relations(
        &self,
        kind: RelationKind,
        field: RelationField,
        value: &str,
    ) -> EngineResult<Vec<Membership>> {
        self.inner.filtered_relations(kind, field, value).await
    }

    async fn add_relations(&self, kind: RelationKind, rows: &[Membership]) -> EngineResult<bool> {
        self.inner.add_relations(kind, rows).await
    }

    async fn remove_relations(&self, kind: RelationKind, rows: &[Membership]) -> EngineResult<bool> {
        if self.fail_remove_relations.load(Ordering::SeqCst) {
            return Err(Self::storage_error());
        }
        self.inner.remove_relations(kind, rows).await
    }

    async fn remove_filtered_relations(
        &self,
        kind: RelationKind,
        field: RelationField,
        value: &str,
    ) -> EngineResult<bool> {
        if self.fail_remove_relations.load(Ordering::SeqCst) {
            return Err(Self::storage_error());
        }
        self.inner.remove_filtered_relations(kind, field, value).await
    }
}
