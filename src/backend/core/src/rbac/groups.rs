//! Group and membership management, generic over entity kind.
//!
//! An empty group still has one row in storage: the kind's null entity is
//! written as a placeholder member when the group is created. Listings never
//! show that placeholder, and the null entity can never be moved in or out of
//! a group by callers.

use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};

use super::models::{
    validate_group_name, validate_name, EntityKind, Group, Membership, ADMIN_GROUP,
};
use crate::engine::{PolicyEngine, RelationField};
use crate::error::{AuthzError, Result};

/// CRUD for groups of one entity kind and their memberships.
///
/// Stateless: every call goes to the engine and every successful write is
/// persisted before returning.
pub struct GroupManager<K> {
    engine: Arc<dyn PolicyEngine>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for GroupManager<K> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: EntityKind> GroupManager<K> {
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self {
            engine,
            _kind: PhantomData,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a group. Creating an existing group is a no-op.
    pub async fn create_group(&self, name: &str) -> Result<()> {
        validate_group_name(name)?;

        if self.group_exists(name).await? {
            debug!(kind = K::GROUP_LABEL, group = name, "Group already exists");
            return Ok(());
        }

        self.engine
            .add_relations(K::RELATION, &[Membership::new(K::NULL_ENTITY, name)])
            .await
            .map_err(AuthzError::engine("add group placeholder"))?;
        self.persist().await?;

        info!(kind = K::GROUP_LABEL, group = name, "Group created");
        Ok(())
    }

    /// Remove a group, its memberships and every policy naming it.
    ///
    /// Policies go first. If the membership removal then fails, the group
    /// still exists and retrying completes the removal.
    pub async fn remove_group(&self, name: &str) -> Result<()> {
        if name == ADMIN_GROUP {
            return Err(AuthzError::conflict(format!(
                "the {} {} cannot be removed",
                ADMIN_GROUP,
                K::GROUP_LABEL
            )));
        }
        if !self.group_exists(name).await? {
            return Err(AuthzError::not_found(K::GROUP_LABEL, name));
        }

        self.engine
            .remove_filtered_policies(K::POLICY_FIELD, name)
            .await
            .map_err(AuthzError::engine("remove group policies"))?;
        self.engine
            .remove_filtered_relations(K::RELATION, RelationField::Group, name)
            .await
            .map_err(AuthzError::engine("remove group memberships"))?;
        self.persist().await?;

        info!(kind = K::GROUP_LABEL, group = name, "Group removed");
        Ok(())
    }

    /// True when at least one membership row names the group.
    pub async fn group_exists(&self, name: &str) -> Result<bool> {
        let rows = self
            .engine
            .filtered_relations(K::RELATION, RelationField::Group, name)
            .await
            .map_err(AuthzError::engine("query group"))?;
        Ok(!rows.is_empty())
    }

    /// Every known group, sorted by name.
    pub async fn groups(&self) -> Result<Vec<Group>> {
        let rows = self
            .engine
            .relations(K::RELATION)
            .await
            .map_err(AuthzError::engine("list groups"))?;

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in rows {
            let members = counts.entry(row.group).or_default();
            if row.entity != K::NULL_ENTITY {
                *members += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(name, members)| Group { name, members })
            .collect())
    }

    /// Every real membership row of this kind.
    pub async fn memberships(&self) -> Result<Vec<Membership>> {
        let rows = self
            .engine
            .relations(K::RELATION)
            .await
            .map_err(AuthzError::engine("list memberships"))?;
        Ok(rows
            .into_iter()
            .filter(|row| row.entity != K::NULL_ENTITY)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memberships
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `entity` to every group in `groups`.
    ///
    /// All groups are checked, in order, before anything is written. Rows that
    /// already exist are skipped and the rest go to the engine in one batch.
    pub async fn add_to_group(&self, entity: &str, groups: &[&str]) -> Result<()> {
        self.check_entity(entity)?;
        let targets = self.existing_groups(groups).await?;

        let current: HashSet<String> = self.groups_for_entity(entity).await?.into_iter().collect();
        let rows: Vec<Membership> = targets
            .into_iter()
            .filter(|group| !current.contains(*group))
            .map(|group| Membership::new(entity, group))
            .collect();

        if rows.is_empty() {
            debug!(kind = K::ENTITY_LABEL, entity, "Memberships already present");
            return Ok(());
        }

        self.engine
            .add_relations(K::RELATION, &rows)
            .await
            .map_err(AuthzError::engine("add memberships"))?;
        self.persist().await?;

        info!(
            kind = K::ENTITY_LABEL,
            entity,
            groups = ?rows.iter().map(|r| r.group.as_str()).collect::<Vec<_>>(),
            "Added to groups"
        );
        Ok(())
    }

    /// Remove `entity` from every group in `groups`.
    ///
    /// Same validation as [`GroupManager::add_to_group`]. Rows that do not
    /// exist are skipped.
    pub async fn remove_from_group(&self, entity: &str, groups: &[&str]) -> Result<()> {
        self.check_entity(entity)?;
        let targets = self.existing_groups(groups).await?;

        let current: HashSet<String> = self.groups_for_entity(entity).await?.into_iter().collect();
        let rows: Vec<Membership> = targets
            .into_iter()
            .filter(|group| current.contains(*group))
            .map(|group| Membership::new(entity, group))
            .collect();

        if rows.is_empty() {
            debug!(kind = K::ENTITY_LABEL, entity, "No memberships to remove");
            return Ok(());
        }

        self.engine
            .remove_relations(K::RELATION, &rows)
            .await
            .map_err(AuthzError::engine("remove memberships"))?;
        self.persist().await?;

        info!(
            kind = K::ENTITY_LABEL,
            entity,
            groups = ?rows.iter().map(|r| r.group.as_str()).collect::<Vec<_>>(),
            "Removed from groups"
        );
        Ok(())
    }

    /// Remove `entity` from every group of this kind.
    pub async fn remove_entity(&self, entity: &str) -> Result<()> {
        self.check_entity(entity)?;

        self.engine
            .remove_filtered_relations(K::RELATION, RelationField::Entity, entity)
            .await
            .map_err(AuthzError::engine("remove entity"))?;
        self.persist().await?;

        info!(kind = K::ENTITY_LABEL, entity, "Removed from all groups");
        Ok(())
    }

    pub async fn groups_for_entity(&self, entity: &str) -> Result<Vec<String>> {
        let rows = self
            .engine
            .filtered_relations(K::RELATION, RelationField::Entity, entity)
            .await
            .map_err(AuthzError::engine("query memberships"))?;
        Ok(rows.into_iter().map(|row| row.group).collect())
    }

    /// Real members of a group. The null entity is never listed.
    pub async fn entities_in_group(&self, group: &str) -> Result<Vec<String>> {
        let rows = self
            .engine
            .filtered_relations(K::RELATION, RelationField::Group, group)
            .await
            .map_err(AuthzError::engine("query group members"))?;

        if rows.is_empty() {
            return Err(AuthzError::not_found(K::GROUP_LABEL, group));
        }

        Ok(rows
            .into_iter()
            .map(|row| row.entity)
            .filter(|entity| entity != K::NULL_ENTITY)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn check_entity(&self, entity: &str) -> Result<()> {
        if entity == K::NULL_ENTITY {
            return Err(AuthzError::conflict(format!(
                "{} is reserved and cannot change group membership",
                K::NULL_ENTITY
            )));
        }
        validate_name(entity)
    }

    /// Deduplicated `groups`, failing on the first one that does not exist.
    async fn existing_groups<'a>(&self, groups: &[&'a str]) -> Result<Vec<&'a str>> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(groups.len());

        for &group in groups {
            if !seen.insert(group) {
                continue;
            }
            if !self.group_exists(group).await? {
                return Err(AuthzError::not_found(K::GROUP_LABEL, group));
            }
            targets.push(group);
        }

        Ok(targets)
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
    use crate::rbac::models::{ResourceKind, UserKind, NULL_RESOURCE, NULL_USER};

    async fn users() -> GroupManager<UserKind> {
        GroupManager::new(Arc::new(CasbinEngine::in_memory().await.unwrap()))
    }

    async fn resources() -> GroupManager<ResourceKind> {
        GroupManager::new(Arc::new(CasbinEngine::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_create_group_is_idempotent() {
        let users = users().await;
        users.create_group("team1").await.unwrap();
        users.create_group("team1").await.unwrap();

        assert!(users.group_exists("team1").await.unwrap());
        assert!(users.entities_in_group("team1").await.unwrap().is_empty());
        assert_eq!(
            users.groups().await.unwrap(),
            vec![Group {
                name: "team1".into(),
                members: 0
            }]
        );
    }

    #[tokio::test]
    async fn test_null_entity_is_rejected() {
        let users = users().await;
        users.create_group("team1").await.unwrap();

        for result in [
            users.add_to_group(NULL_USER, &["team1"]).await,
            users.remove_from_group(NULL_USER, &["team1"]).await,
            users.remove_entity(NULL_USER).await,
        ] {
            assert!(matches!(result, Err(AuthzError::Conflict { .. })));
        }

        let resources = resources().await;
        assert!(matches!(
            resources.add_to_group(NULL_RESOURCE, &["missing"]).await,
            Err(AuthzError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_validates_every_group_first() {
        let users = users().await;
        users.create_group("team1").await.unwrap();

        let err = users
            .add_to_group("alice", &["team1", "ghost"])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::NotFound { ref name, .. } if name == "ghost"));
        assert!(users.groups_for_entity("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_skips_existing_rows() {
        let users = users().await;
        users.create_group("a").await.unwrap();
        users.create_group("b").await.unwrap();

        users.add_to_group("alice", &["a"]).await.unwrap();
        users.add_to_group("alice", &["a", "b", "b"]).await.unwrap();

        let mut groups = users.groups_for_entity("alice").await.unwrap();
        groups.sort();
        assert_eq!(groups, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_remove_from_group() {
        let users = users().await;
        users.create_group("a").await.unwrap();
        users.create_group("b").await.unwrap();
        users.add_to_group("alice", &["a", "b"]).await.unwrap();

        users.remove_from_group("alice", &["a"]).await.unwrap();
        assert_eq!(users.groups_for_entity("alice").await.unwrap(), vec!["b"]);

        // Removing a membership that is not there is a no-op.
        users.remove_from_group("alice", &["a"]).await.unwrap();
        assert!(users.group_exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_entity_keeps_groups() {
        let users = users().await;
        users.create_group("a").await.unwrap();
        users.add_to_group("alice", &["a"]).await.unwrap();

        users.remove_entity("alice").await.unwrap();
        users.remove_entity("alice").await.unwrap();

        assert!(users.groups_for_entity("alice").await.unwrap().is_empty());
        assert!(users.group_exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_group() {
        let users = users().await;
        users.create_group("team1").await.unwrap();
        users.add_to_group("alice", &["team1"]).await.unwrap();

        users.remove_group("team1").await.unwrap();
        assert!(!users.group_exists("team1").await.unwrap());
        assert!(users.groups_for_entity("alice").await.unwrap().is_empty());

        assert!(matches!(
            users.remove_group("team1").await,
            Err(AuthzError::NotFound { .. })
        ));
        assert!(matches!(
            users.remove_group(ADMIN_GROUP).await,
            Err(AuthzError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_entities_in_missing_group() {
        let resources = resources().await;
        assert!(matches!(
            resources.entities_in_group("docs").await,
            Err(AuthzError::NotFound { kind: "resource group", .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_names() {
        let users = users().await;
        assert!(matches!(
            users.create_group("*").await,
            Err(AuthzError::InvalidName { .. })
        ));
        assert!(matches!(
            users.create_group("a,b").await,
            Err(AuthzError::InvalidName { .. })
        ));
        users.create_group("a").await.unwrap();
        assert!(matches!(
            users.add_to_group("", &["a"]).await,
            Err(AuthzError::InvalidName { .. })
        ));
    }

    #[tokio::test]
    async fn test_memberships_hide_placeholders() {
        let users = users().await;
        users.create_group("a").await.unwrap();
        users.create_group("b").await.unwrap();
        users.add_to_group("alice", &["a"]).await.unwrap();

        assert_eq!(
            users.memberships().await.unwrap(),
            vec![Membership::new("alice", "a")]
        );
        let groups = users.groups().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, 1);
        assert_eq!(groups[1].members, 0);
    }
}
