//! Startup seeding of the authorization store.
//!
//! On every start the engine is reloaded from storage and two rows are
//! guaranteed to exist:
//!
//! | Row                         | Purpose                                   |
//! |-----------------------------|-------------------------------------------|
//! | policy `(admin, *, *)`      | the admin group can do anything            |
//! | membership `nullUser→admin` | the placeholder identity is always admin   |
//!
//! A [`Seed`] can additionally provide default rows for a fresh deployment.
//! Each seed table is only applied when the matching store table is empty, so
//! edits made later through the managers survive restarts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::models::{
    validate_group_name, validate_name, Membership, Policy, ADMIN_GROUP, NULL_RESOURCE, NULL_USER,
};
use crate::engine::{PolicyEngine, RelationField, RelationKind};
use crate::error::{AuthzError, Result};

/// Default rows for a fresh store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub policies: Vec<Policy>,

    #[serde(default)]
    pub user_groups: Vec<Membership>,

    #[serde(default)]
    pub resource_groups: Vec<Membership>,
}

impl Seed {
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.user_groups.is_empty() && self.resource_groups.is_empty()
    }

    fn validate(&self) -> Result<()> {
        for policy in &self.policies {
            policy.validate()?;
        }
        for (rows, null_entity) in [
            (&self.user_groups, NULL_USER),
            (&self.resource_groups, NULL_RESOURCE),
        ] {
            for row in rows {
                if row.entity == null_entity {
                    return Err(AuthzError::conflict(format!(
                        "seed rows cannot reference {}",
                        null_entity
                    )));
                }
                validate_name(&row.entity)?;
                validate_group_name(&row.group)?;
            }
        }
        Ok(())
    }
}

/// Load the engine, apply `seed` and ensure the admin rows exist.
pub async fn bootstrap(engine: &dyn PolicyEngine, seed: Option<&Seed>) -> Result<()> {
    engine
        .load_policy()
        .await
        .map_err(AuthzError::engine("load policy"))?;

    let mut dirty = false;

    if let Some(seed) = seed.filter(|s| !s.is_empty()) {
        seed.validate()?;
        dirty |= apply_seed(engine, seed).await?;
    }

    let admin = Policy::admin();
    let has_admin = engine
        .has_policy(&admin)
        .await
        .map_err(AuthzError::engine("query admin policy"))?;
    if !has_admin {
        engine
            .add_policy(&admin)
            .await
            .map_err(AuthzError::engine("seed admin policy"))?;
        info!(policy = %admin, "Seeded admin policy");
        dirty = true;
    }

    let anchor = Membership::new(NULL_USER, ADMIN_GROUP);
    let has_anchor = engine
        .filtered_relations(RelationKind::UserGrouping, RelationField::Entity, NULL_USER)
        .await
        .map_err(AuthzError::engine("query admin membership"))?
        .contains(&anchor);
    if !has_anchor {
        engine
            .add_relations(RelationKind::UserGrouping, &[anchor.clone()])
            .await
            .map_err(AuthzError::engine("seed admin membership"))?;
        info!(membership = %anchor, "Seeded admin membership");
        dirty = true;
    }

    if dirty {
        engine
            .save_policy()
            .await
            .map_err(AuthzError::engine("save policy"))?;
    }

    Ok(())
}

async fn apply_seed(engine: &dyn PolicyEngine, seed: &Seed) -> Result<bool> {
    let mut dirty = false;

    if !seed.policies.is_empty() {
        let stored = engine
            .policies()
            .await
            .map_err(AuthzError::engine("list policies"))?;
        if stored.is_empty() {
            let unique: BTreeSet<&Policy> = seed.policies.iter().collect();
            for policy in unique {
                engine
                    .add_policy(policy)
                    .await
                    .map_err(AuthzError::engine("seed policy"))?;
            }
            info!(count = seed.policies.len(), "Seeded default policies");
            dirty = true;
        }
    }

    for (kind, rows) in [
        (RelationKind::UserGrouping, &seed.user_groups),
        (RelationKind::ResourceGrouping, &seed.resource_groups),
    ] {
        if rows.is_empty() {
            continue;
        }
        let stored = engine
            .relations(kind)
            .await
            .map_err(AuthzError::engine("list memberships"))?;
        if !stored.is_empty() {
            continue;
        }

        let unique: Vec<Membership> = rows
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        engine
            .add_relations(kind, &unique)
            .await
            .map_err(AuthzError::engine("seed memberships"))?;
        info!(relation = kind.ptype(), count = unique.len(), "Seeded default memberships");
        dirty = true;
    }

    Ok(dirty)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
