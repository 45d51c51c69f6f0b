//! Core data models for group-based authorization.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::{PolicyField, RelationKind};
use crate::error::{AuthzError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Reserved names
// ═══════════════════════════════════════════════════════════════════════════════

/// Protected group. Cannot be removed, in either kind.
pub const ADMIN_GROUP: &str = "admin";

/// Placeholder user. Member of `admin` and of every empty user group.
pub const NULL_USER: &str = "nullUser";

/// Placeholder resource. Member of every empty resource group.
pub const NULL_RESOURCE: &str = "nullResource";

/// Matches any value in a policy column.
pub const WILDCARD: &str = "*";

/// Identity attached to requests that present no credentials.
pub const UNAUTHENTICATED_USER: &str = "__unauthenticated__";

/// Identities a credential check must never resolve to.
pub const RESERVED_IDENTITIES: [&str; 2] = [NULL_USER, UNAUTHENTICATED_USER];

// ═══════════════════════════════════════════════════════════════════════════════
// Entity kinds
// ═══════════════════════════════════════════════════════════════════════════════

/// Describes one kind of groupable entity.
///
/// Implemented by the uninhabited markers [`UserKind`] and [`ResourceKind`]
/// so a single `GroupManager<K>` serves both relations.
pub trait EntityKind: Send + Sync + 'static {
    /// Human readable entity label, e.g. `"user"`.
    const ENTITY_LABEL: &'static str;
    /// Human readable group label, e.g. `"user group"`.
    const GROUP_LABEL: &'static str;
    /// Reserved placeholder entity of this kind.
    const NULL_ENTITY: &'static str;
    /// Relation holding memberships of this kind.
    const RELATION: RelationKind;
    /// Policy column naming groups of this kind.
    const POLICY_FIELD: PolicyField;
}

/// Callers and their user groups.
#[derive(Debug)]
pub enum UserKind {}

impl EntityKind for UserKind {
    const ENTITY_LABEL: &'static str = "user";
    const GROUP_LABEL: &'static str = "user group";
    const NULL_ENTITY: &'static str = NULL_USER;
    const RELATION: RelationKind = RelationKind::UserGrouping;
    const POLICY_FIELD: PolicyField = PolicyField::Subject;
}

/// Paths or capabilities and their resource groups.
#[derive(Debug)]
pub enum ResourceKind {}

impl EntityKind for ResourceKind {
    const ENTITY_LABEL: &'static str = "resource";
    const GROUP_LABEL: &'static str = "resource group";
    const NULL_ENTITY: &'static str = NULL_RESOURCE;
    const RELATION: RelationKind = RelationKind::ResourceGrouping;
    const POLICY_FIELD: PolicyField = PolicyField::Object;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rows
// ═══════════════════════════════════════════════════════════════════════════════

/// An `(entity, group)` membership row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Membership {
    pub entity: String,
    pub group: String,
}

impl Membership {
    pub fn new(entity: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            group: group.into(),
        }
    }

    pub fn to_rule(&self) -> Vec<String> {
        vec![self.entity.clone(), self.group.clone()]
    }

    /// Parse an engine row. Rows with the wrong arity are rejected.
    pub fn from_rule(rule: &[String]) -> Option<Self> {
        match rule {
            [entity, group] => Some(Self::new(entity, group)),
            _ => None,
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.entity, self.group)
    }
}

/// A `(user group, resource group, action)` grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Policy {
    pub user_group: String,
    pub resource_group: String,
    pub action: String,
}

impl Policy {
    pub fn new(
        user_group: impl Into<String>,
        resource_group: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_group: user_group.into(),
            resource_group: resource_group.into(),
            action: action.into(),
        }
    }

    /// The protected `(admin, *, *)` grant.
    pub fn admin() -> Self {
        Self::new(ADMIN_GROUP, WILDCARD, WILDCARD)
    }

    pub fn is_admin(&self) -> bool {
        self.user_group == ADMIN_GROUP
            && self.resource_group == WILDCARD
            && self.action == WILDCARD
    }

    pub fn to_rule(&self) -> Vec<String> {
        vec![
            self.user_group.clone(),
            self.resource_group.clone(),
            self.action.clone(),
        ]
    }

    pub fn from_rule(rule: &[String]) -> Option<Self> {
        match rule {
            [user_group, resource_group, action] => {
                Some(Self::new(user_group, resource_group, action))
            }
            _ => None,
        }
    }

    /// Check every column can be stored.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.user_group)?;
        validate_name(&self.resource_group)?;
        validate_name(&self.action)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.user_group, self.resource_group, self.action)
    }
}

/// A group as listed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    /// Real members only; placeholders are not counted.
    pub members: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Name validation
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage rows are comma separated and line oriented.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AuthzError::invalid_name(name, "must not be empty"));
    }
    if name.contains(',') {
        return Err(AuthzError::invalid_name(name, "must not contain ','"));
    }
    if name.contains(['\n', '\r']) {
        return Err(AuthzError::invalid_name(name, "must not contain line breaks"));
    }
    Ok(())
}

/// Group names additionally cannot be the wildcard.
pub fn validate_group_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name == WILDCARD {
        return Err(AuthzError::invalid_name(name, "'*' is reserved for policies"));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_policy() {
        assert!(Policy::admin().is_admin());
        assert!(!Policy::new(ADMIN_GROUP, WILDCARD, "GET").is_admin());
        assert!(!Policy::new("ops", WILDCARD, WILDCARD).is_admin());
    }

    #[test]
    fn test_rule_parsing_rejects_wrong_arity() {
        let row = vec!["a".to_string(), "b".to_string()];
        assert_eq!(Membership::from_rule(&row), Some(Membership::new("a", "b")));
        assert_eq!(Policy::from_rule(&row), None);

        let row = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(Policy::from_rule(&row), Some(Policy::new("a", "b", "c")));
        assert_eq!(Membership::from_rule(&row), None);
    }

    #[test]
    fn test_kind_descriptors() {
        assert_eq!(UserKind::NULL_ENTITY, NULL_USER);
        assert_eq!(UserKind::RELATION, RelationKind::UserGrouping);
        assert_eq!(ResourceKind::NULL_ENTITY, NULL_RESOURCE);
        assert_eq!(ResourceKind::POLICY_FIELD, PolicyField::Object);
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("team-1").is_ok());
        assert!(validate_name("/docs/{id}").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("a,b").is_err());
        assert!(validate_name("a\nb").is_err());

        assert!(validate_name(WILDCARD).is_ok());
        assert!(validate_group_name(WILDCARD).is_err());
    }

    #[test]
    fn test_policy_serialization() {
        let json = serde_json::to_value(Policy::new("team1", "docs", "GET")).unwrap();
        assert_eq!(json["user_group"], "team1");
        assert_eq!(json["resource_group"], "docs");
        assert_eq!(json["action"], "GET");
    }
}
