//! Casbin-backed policy engine.
//!
//! Wraps a single [`casbin::Enforcer`] behind a `tokio` read/write lock.
//! Enforcement and queries share the read lock; mutations and load/save take
//! the write lock, so administrative writes are serialized against each other
//! and never observed half-applied by a concurrent `enforce`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use casbin::{Adapter, CoreApi, DefaultModel, Enforcer, FileAdapter, MemoryAdapter, MgmtApi};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{EngineResult, PolicyEngine, PolicyField, RelationField, RelationKind};
use crate::rbac::models::{Membership, Policy};

/// Fixed request model.
///
/// A request is allowed when some policy row matches on all three columns:
/// the subject is in the policy's user group (or the policy names `*`), the
/// object is in the policy's resource group (or `*`), and the action matches
/// (or `*`). There is no deny effect.
pub const MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _
g2 = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = (g(r.sub, p.sub) || p.sub == "*") && (g2(r.obj, p.obj) || p.obj == "*") && (r.act == p.act || p.act == "*")
"#;

/// [`PolicyEngine`] implementation over any casbin storage adapter.
pub struct CasbinEngine {
    enforcer: RwLock<Enforcer>,
}

impl CasbinEngine {
    /// Build an engine over the given adapter. Rows already stored by the
    /// adapter are loaded immediately.
    pub async fn new<A>(adapter: A) -> EngineResult<Self>
    where
        A: Adapter + 'static,
    {
        let model = DefaultModel::from_str(MODEL).await?;
        let enforcer = Enforcer::new(model, adapter).await?;
        Ok(Self {
            enforcer: RwLock::new(enforcer),
        })
    }

    /// Engine with no durable storage. Used by tests and embedded setups.
    pub async fn in_memory() -> EngineResult<Self> {
        Self::new(MemoryAdapter::default()).await
    }

    /// Engine persisted to a CSV policy file. The file (and its parent
    /// directories) are created empty when missing.
    pub async fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();

        if !tokio::fs::try_exists(&path).await? {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, b"").await?;
            info!(path = %path.display(), "Created empty policy file");
        }

        debug!(path = %path.display(), "Opening file-backed policy engine");
        Self::new(FileAdapter::new(path)).await
    }
}

fn policy_rows(rows: Vec<Vec<String>>) -> Vec<Policy> {
    rows.iter().filter_map(|row| Policy::from_rule(row)).collect()
}

fn relation_rows(rows: Vec<Vec<String>>) -> Vec<Membership> {
    rows.iter().filter_map(|row| Membership::from_rule(row)).collect()
}

#[async_trait]
impl PolicyEngine for CasbinEngine {
    async fn load_policy(&self) -> EngineResult<()> {
        self.enforcer.write().await.load_policy().await?;
        Ok(())
    }

    async fn save_policy(&self) -> EngineResult<()> {
        self.enforcer.write().await.save_policy().await?;
        Ok(())
    }

    async fn enforce(&self, subject: &str, object: &str, action: &str) -> EngineResult<bool> {
        let enforcer = self.enforcer.read().await;
        Ok(enforcer.enforce((subject, object, action))?)
    }

    async fn policies(&self) -> EngineResult<Vec<Policy>> {
        Ok(policy_rows(self.enforcer.read().await.get_policy()))
    }

    async fn filtered_policies(
        &self,
        field: PolicyField,
        value: &str,
    ) -> EngineResult<Vec<Policy>> {
        let rows = self
            .enforcer
            .read()
            .await
            .get_filtered_policy(field.index(), vec![value.to_string()]);
        Ok(policy_rows(rows))
    }

    async fn has_policy(&self, policy: &Policy) -> EngineResult<bool> {
        Ok(self.enforcer.read().await.has_policy(policy.to_rule()))
    }

    async fn add_policy(&self, policy: &Policy) -> EngineResult<bool> {
        Ok(self.enforcer.write().await.add_policy(policy.to_rule()).await?)
    }

    async fn remove_policy(&self, policy: &Policy) -> EngineResult<bool> {
        Ok(self
            .enforcer
            .write()
            .await
            .remove_policy(policy.to_rule())
            .await?)
    }

    async fn remove_filtered_policies(
        &self,
        field: PolicyField,
        value: &str,
    ) -> EngineResult<bool> {
        Ok(self
            .enforcer
            .write()
            .await
            .remove_filtered_policy(field.index(), vec![value.to_string()])
            .await?)
    }

    async fn relations(&self, kind: RelationKind) -> EngineResult<Vec<Membership>> {
        let rows = self
            .enforcer
            .read()
            .await
            .get_named_grouping_policy(kind.ptype());
        Ok(relation_rows(rows))
    }

    async fn filtered_relations(
        &self,
        kind: RelationKind,
        field: RelationField,
        value: &str,
    ) -> EngineResult<Vec<Membership>> {
        let rows = self.enforcer.read().await.get_filtered_named_grouping_policy(
            kind.ptype(),
            field.index(),
            vec![value.to_string()],
        );
        Ok(relation_rows(rows))
    }

    async fn add_relations(&self, kind: RelationKind, rows: &[Membership]) -> EngineResult<bool> {
        if rows.is_empty() {
            return Ok(false);
        }
        let rules = rows.iter().map(Membership::to_rule).collect();
        Ok(self
            .enforcer
            .write()
            .await
            .add_named_grouping_policies(kind.ptype(), rules)
            .await?)
    }

    async fn remove_relations(
        &self,
        kind: RelationKind,
        rows: &[Membership],
    ) -> EngineResult<bool> {
        if rows.is_empty() {
            return Ok(false);
        }
        let rules = rows.iter().map(Membership::to_rule).collect();
        Ok(self
            .enforcer
            .write()
            .await
            .remove_named_grouping_policies(kind.ptype(), rules)
            .await?)
    }

    async fn remove_filtered_relations(
        &self,
        kind: RelationKind,
        field: RelationField,
        value: &str,
    ) -> EngineResult<bool> {
        Ok(self
            .enforcer
            .write()
            .await
            .remove_filtered_named_grouping_policy(
                kind.ptype(),
                field.index(),
                vec![value.to_string()],
            )
            .await?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
