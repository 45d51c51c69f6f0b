//! Access policy management.
//!
//! A policy lets every member of a user group perform an action on every
//! member of a resource group. Any column may be the wildcard `*`.

use std::sync::Arc;

use tracing::{debug, info};

use super::groups::GroupManager;
use super::models::{EntityKind, Policy, ResourceKind, UserKind, WILDCARD};
use crate::engine::{PolicyEngine, PolicyField};
use crate::error::{AuthzError, Result};

/// CRUD for `(user group, resource group, action)` policies.
#[derive(Clone)]
pub struct PolicyManager {
    engine: Arc<dyn PolicyEngine>,
}

impl PolicyManager {
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self { engine }
    }

    /// Grant `action` on `resource_group` to `user_group`.
    ///
    /// Both groups must exist unless given as `*`. Adding an existing policy
    /// is a no-op.
    pub async fn add_policy(
        &self,
        user_group: &str,
        resource_group: &str,
        action: &str,
    ) -> Result<()> {
        let policy = Policy::new(user_group, resource_group, action);
        policy.validate()?;

        self.require_group::<UserKind>(user_group).await?;
        self.require_group::<ResourceKind>(resource_group).await?;

        let exists = self
            .engine
            .has_policy(&policy)
            .await
            .map_err(AuthzError::engine("query policy"))?;
        if exists {
            debug!(policy = %policy, "Policy already exists");
            return Ok(());
        }

        self.engine
            .add_policy(&policy)
            .await
            .map_err(AuthzError::engine("add policy"))?;
        self.persist().await?;

        info!(policy = %policy, "Policy added");
        Ok(())
    }

    /// Revoke a policy. Removing a policy that does not exist is a no-op;
    /// the admin policy can never be removed.
    pub async fn remove_policy(
        &self,
        user_group: &str,
        resource_group: &str,
        action: &str,
    ) -> Result<()> {
        let policy = Policy::new(user_group, resource_group, action);
        if policy.is_admin() {
            return Err(AuthzError::conflict("the admin policy cannot be removed"));
        }

        let removed = self
            .engine
            .remove_policy(&policy)
            .await
            .map_err(AuthzError::engine("remove policy"))?;
        self.persist().await?;

        if removed {
            info!(policy = %policy, "Policy removed");
        } else {
            debug!(policy = %policy, "Policy not present");
        }
        Ok(())
    }

    pub async fn list_policies(&self) -> Result<Vec<Policy>> {
        self.engine
            .policies()
            .await
            .map_err(AuthzError::engine("list policies"))
    }

    /// Policies granted to one user group. Wildcard subjects are not expanded.
    pub async fn policies_for_group(&self, user_group: &str) -> Result<Vec<Policy>> {
        self.engine
            .filtered_policies(PolicyField::Subject, user_group)
            .await
            .map_err(AuthzError::engine("query policies"))
    }

    async fn require_group<K: EntityKind>(&self, group: &str) -> Result<()> {
        if group == WILDCARD {
            return Ok(());
        }
        if GroupManager::<K>::new(self.engine.clone())
            .group_exists(group)
            .await?
        {
            Ok(())
        } else {
            Err(AuthzError::not_found(K::GROUP_LABEL, group))
        }
    }

    async fn persist(&self) -> Result<()> {
        super::persist(self.engine.as_ref()).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CasbinEngine;

    async fn setup() -> (PolicyManager, GroupManager<UserKind>, GroupManager<ResourceKind>) {
        let engine: Arc<dyn PolicyEngine> = Arc::new(CasbinEngine::in_memory().await.unwrap());
        (
            PolicyManager::new(engine.clone()),
            GroupManager::new(engine.clone()),
            GroupManager::new(engine),
        )
    }

    #[tokio::test]
    async fn test_add_policy_requires_groups() {
        let (policies, users, resources) = setup().await;

        assert!(matches!(
            policies.add_policy("team1", "docs", "GET").await,
            Err(AuthzError::NotFound { kind: "user group", .. })
        ));

        users.create_group("team1").await.unwrap();
        assert!(matches!(
            policies.add_policy("team1", "docs", "GET").await,
            Err(AuthzError::NotFound { kind: "resource group", .. })
        ));

        resources.create_group("docs").await.unwrap();
        policies.add_policy("team1", "docs", "GET").await.unwrap();
    }

    #[tokio::test]
    async fn test_user_and_resource_namespaces_are_separate() {
        let (policies, users, _) = setup().await;
        users.create_group("docs").await.unwrap();

        assert!(matches!(
            policies.add_policy("docs", "docs", "GET").await,
            Err(AuthzError::NotFound { kind: "resource group", .. })
        ));
    }

    #[tokio::test]
    async fn test_wildcards_skip_existence_checks() {
        let (policies, _, _) = setup().await;
        policies.add_policy("*", "*", "GET").await.unwrap();
        assert_eq!(
            policies.list_policies().await.unwrap(),
            vec![Policy::new("*", "*", "GET")]
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_is_noop() {
        let (policies, users, resources) = setup().await;
        users.create_group("team1").await.unwrap();
        resources.create_group("docs").await.unwrap();

        policies.add_policy("team1", "docs", "GET").await.unwrap();
        policies.add_policy("team1", "docs", "GET").await.unwrap();

        assert_eq!(policies.list_policies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_policy() {
        let (policies, users, resources) = setup().await;
        users.create_group("team1").await.unwrap();
        resources.create_group("docs").await.unwrap();
        policies.add_policy("team1", "docs", "GET").await.unwrap();

        policies.remove_policy("team1", "docs", "GET").await.unwrap();
        policies.remove_policy("team1", "docs", "GET").await.unwrap();
        assert!(policies.list_policies().await.unwrap().is_empty());

        assert!(matches!(
            policies.remove_policy("admin", "*", "*").await,
            Err(AuthzError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_policies_for_group() {
        let (policies, users, resources) = setup().await;
        users.create_group("team1").await.unwrap();
        users.create_group("team2").await.unwrap();
        resources.create_group("docs").await.unwrap();
        policies.add_policy("team1", "docs", "GET").await.unwrap();
        policies.add_policy("team2", "docs", "PUT").await.unwrap();

        assert_eq!(
            policies.policies_for_group("team1").await.unwrap(),
            vec![Policy::new("team1", "docs", "GET")]
        );
    }

    #[tokio::test]
    async fn test_empty_action_rejected() {
        let (policies, _, _) = setup().await;
        assert!(matches!(
            policies.add_policy("*", "*", "").await,
            Err(AuthzError::InvalidName { .. })
        ));
    }
}
