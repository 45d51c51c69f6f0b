//! Integration tests for the group/policy authorization core.
//!
//! Tests cover:
//! - Group idempotence and null-entity protection
//! - Admin group and admin policy protection
//! - End-to-end enforcement scenarios
//! - File-backed persistence across restarts
//! - Engine failures surfacing as `Engine` errors

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::FaultyEngine;
use servicekit_core::engine::CasbinEngine;
use servicekit_core::error::AuthzError;
use servicekit_core::rbac::{
    AuthModule, Membership, Policy, Seed, ADMIN_GROUP, NULL_RESOURCE, NULL_USER,
};

// ============================================================================
// Helpers
// ============================================================================

/// Module with the scenario from the docs: alice in team1, /docs in docs,
/// team1 may GET docs.
async fn scenario() -> AuthModule {
    let auth = AuthModule::in_memory().await.unwrap();
    auth.create_user_group("team1").await.unwrap();
    auth.add_user_to_group("alice", &["team1"]).await.unwrap();
    auth.create_resource_group("docs").await.unwrap();
    auth.add_resource_to_group("/docs", &["docs"]).await.unwrap();
    auth.add_policy("team1", "docs", "GET").await.unwrap();
    auth
}

// ============================================================================
// Group Invariants
// ============================================================================

#[tokio::test]
async fn test_create_group_twice_keeps_members() {
    let auth = AuthModule::in_memory().await.unwrap();
    auth.create_user_group("g1").await.unwrap();
    auth.add_user_to_group("alice", &["g1"]).await.unwrap();

    auth.create_user_group("g1").await.unwrap();
    auth.create_resource_group("r1").await.unwrap();
    auth.create_resource_group("r1").await.unwrap();

    assert_eq!(auth.get_users_in_group("g1").await.unwrap(), vec!["alice"]);
    assert!(auth.get_resources_in_group("r1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_null_entities_are_always_conflicts() {
    let auth = AuthModule::in_memory().await.unwrap();
    auth.create_user_group("g1").await.unwrap();
    auth.create_resource_group("r1").await.unwrap();

    for group in ["g1", ADMIN_GROUP, "missing"] {
        assert!(matches!(
            auth.add_user_to_group(NULL_USER, &[group]).await,
            Err(AuthzError::Conflict { .. })
        ));
        assert!(matches!(
            auth.remove_user_from_group(NULL_USER, &[group]).await,
            Err(AuthzError::Conflict { .. })
        ));
    }
    assert!(matches!(
        auth.remove_user(NULL_USER).await,
        Err(AuthzError::Conflict { .. })
    ));

    for group in ["r1", "missing"] {
        assert!(matches!(
            auth.add_resource_to_group(NULL_RESOURCE, &[group]).await,
            Err(AuthzError::Conflict { .. })
        ));
        assert!(matches!(
            auth.remove_resource_from_group(NULL_RESOURCE, &[group]).await,
            Err(AuthzError::Conflict { .. })
        ));
    }
    assert!(matches!(
        auth.remove_resource(NULL_RESOURCE).await,
        Err(AuthzError::Conflict { .. })
    ));

    // The admin membership of the null user survives every attempt.
    assert!(auth.enforce(NULL_USER, "/anything", "GET").await.unwrap());
}

#[tokio::test]
async fn test_admin_group_and_policy_are_protected() {
    let auth = AuthModule::in_memory().await.unwrap();
    auth.create_resource_group(ADMIN_GROUP).await.unwrap();

    assert!(matches!(
        auth.remove_user_group(ADMIN_GROUP).await,
        Err(AuthzError::Conflict { .. })
    ));
    assert!(matches!(
        auth.remove_resource_group(ADMIN_GROUP).await,
        Err(AuthzError::Conflict { .. })
    ));
    assert!(matches!(
        auth.remove_policy(ADMIN_GROUP, "*", "*").await,
        Err(AuthzError::Conflict { .. })
    ));

    assert!(auth.list_policies().await.unwrap().contains(&Policy::admin()));
}

#[tokio::test]
async fn test_fresh_admin_group_lists_no_members() {
    let auth = AuthModule::in_memory().await.unwrap();

    assert!(auth.get_users_in_group(ADMIN_GROUP).await.unwrap().is_empty());
    assert_eq!(
        auth.get_groups_for_user(NULL_USER).await.unwrap(),
        vec![ADMIN_GROUP]
    );
}

#[tokio::test]
async fn test_membership_across_two_groups() {
    let auth = AuthModule::in_memory().await.unwrap();
    auth.create_user_group("g1").await.unwrap();
    auth.create_user_group("g2").await.unwrap();

    auth.add_user_to_group("u", &["g1", "g2"]).await.unwrap();
    let groups = auth.get_groups_for_user("u").await.unwrap();
    assert!(groups.contains(&"g1".to_string()));
    assert!(groups.contains(&"g2".to_string()));

    auth.remove_user_from_group("u", &["g1"]).await.unwrap();
    let groups = auth.get_groups_for_user("u").await.unwrap();
    assert!(!groups.contains(&"g1".to_string()));
    assert!(groups.contains(&"g2".to_string()));
}

#[tokio::test]
async fn test_duplicate_policy_listed_once() {
    let auth = AuthModule::in_memory().await.unwrap();
    auth.create_user_group("ug").await.unwrap();
    auth.create_resource_group("rg").await.unwrap();

    auth.add_policy("ug", "rg", "GET").await.unwrap();
    auth.add_policy("ug", "rg", "GET").await.unwrap();

    let matching = auth
        .list_policies()
        .await
        .unwrap()
        .into_iter()
        .filter(|p| *p == Policy::new("ug", "rg", "GET"))
        .count();
    assert_eq!(matching, 1);
}

// ============================================================================
// Enforcement Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_enforcement() {
    let auth = scenario().await;

    assert!(auth.enforce("alice", "/docs", "GET").await.unwrap());
    assert!(!auth.enforce("alice", "/docs", "DELETE").await.unwrap());
    assert!(!auth.enforce("mallory", "/docs", "GET").await.unwrap());
}

#[tokio::test]
async fn test_missing_group_leaves_user_without_groups() {
    let auth = AuthModule::in_memory().await.unwrap();

    let err = auth
        .add_user_to_group("bob", &["nonexistent-group"])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthzError::NotFound { kind: "user group", ref name } if name == "nonexistent-group"
    ));
    assert!(auth.get_groups_for_user("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_removing_user_group_revokes_its_policies() {
    let auth = scenario().await;

    auth.remove_user_group("team1").await.unwrap();

    assert!(!auth.enforce("alice", "/docs", "GET").await.unwrap());
    assert!(!auth
        .list_policies()
        .await
        .unwrap()
        .contains(&Policy::new("team1", "docs", "GET")));
    assert!(auth.get_groups_for_user("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_removing_resource_group_revokes_its_policies() {
    let auth = scenario().await;
    auth.create_user_group("docs").await.unwrap();
    auth.add_policy("docs", "*", "GET").await.unwrap();

    auth.remove_resource_group("docs").await.unwrap();

    let policies = auth.list_policies().await.unwrap();
    assert!(!policies.contains(&Policy::new("team1", "docs", "GET")));
    // A user group with the same name is a different group.
    assert!(policies.contains(&Policy::new("docs", "*", "GET")));
    assert!(!auth.enforce("alice", "/docs", "GET").await.unwrap());
}

#[tokio::test]
async fn test_wildcard_policies() {
    let auth = scenario().await;
    auth.create_user_group("readers").await.unwrap();
    auth.add_user_to_group("carol", &["readers"]).await.unwrap();
    auth.add_policy("readers", "*", "GET").await.unwrap();
    auth.add_policy("*", "docs", "HEAD").await.unwrap();

    assert!(auth.enforce("carol", "/anything", "GET").await.unwrap());
    assert!(!auth.enforce("carol", "/anything", "PUT").await.unwrap());
    assert!(auth.enforce("mallory", "/docs", "HEAD").await.unwrap());
    assert!(!auth.enforce("mallory", "/other", "HEAD").await.unwrap());
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("policy.csv");

    {
        let auth = AuthModule::from_file(&path).await.unwrap();
        auth.create_user_group("team1").await.unwrap();
        auth.add_user_to_group("alice", &["team1"]).await.unwrap();
        auth.create_resource_group("docs").await.unwrap();
        auth.add_resource_to_group("/docs", &["docs"]).await.unwrap();
        auth.add_policy("team1", "docs", "GET").await.unwrap();
    }

    let auth = AuthModule::from_file(&path).await.unwrap();
    assert!(auth.enforce("alice", "/docs", "GET").await.unwrap());
    assert_eq!(auth.list_policies().await.unwrap().len(), 2);
    assert_eq!(auth.get_users_in_group("team1").await.unwrap(), vec!["alice"]);

    // The null user holds the admin membership plus the team1 placeholder.
    let mut groups = auth.get_groups_for_user(NULL_USER).await.unwrap();
    groups.sort();
    assert_eq!(groups, vec![ADMIN_GROUP, "team1"]);
}

#[tokio::test]
async fn test_seed_ignored_once_store_has_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.csv");
    let seed = Seed {
        policies: vec![Policy::new("readers", "docs", "GET")],
        user_groups: vec![Membership::new("alice", "readers")],
        resource_groups: vec![Membership::new("/docs", "docs")],
    };

    {
        let engine = Arc::new(CasbinEngine::from_file(&path).await.unwrap());
        let auth = AuthModule::builder(engine).seed(seed.clone()).init().await.unwrap();
        auth.remove_policy("readers", "docs", "GET").await.unwrap();
    }

    let engine = Arc::new(CasbinEngine::from_file(&path).await.unwrap());
    let auth = AuthModule::builder(engine).seed(seed).init().await.unwrap();

    assert_eq!(auth.list_policies().await.unwrap(), vec![Policy::admin()]);
    assert!(!auth.enforce("alice", "/docs", "GET").await.unwrap());
}

// ============================================================================
// Engine Failures
// ============================================================================

#[tokio::test]
async fn test_persist_failure_is_engine_error() {
    let engine = Arc::new(FaultyEngine::new().await);
    let auth = AuthModule::init(engine.clone()).await.unwrap();

    engine.fail_save.store(true, Ordering::SeqCst);

    let err = auth.create_user_group("team1").await.unwrap_err();
    assert!(matches!(err, AuthzError::Engine { action: "save policy", .. }));
    assert_eq!(err.code(), "ENGINE_ERROR");
}

#[tokio::test]
async fn test_enforce_failure_is_engine_error() {
    let engine = Arc::new(FaultyEngine::new().await);
    let auth = AuthModule::init(engine.clone()).await.unwrap();

    engine.fail_enforce.store(true, Ordering::SeqCst);

    assert!(matches!(
        auth.enforce("alice", "/docs", "GET").await,
        Err(AuthzError::Engine { .. })
    ));
}

#[tokio::test]
async fn test_failed_save_is_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.csv");

    {
        let engine = Arc::new(FaultyEngine::from_file(&path).await);
        let auth = AuthModule::init(engine.clone()).await.unwrap();
        auth.create_resource_group("docs").await.unwrap();

        engine.fail_save.store(true, Ordering::SeqCst);
        assert!(matches!(
            auth.create_user_group("team1").await,
            Err(AuthzError::Engine { action: "save policy", .. })
        ));
        assert!(matches!(
            auth.add_policy("*", "docs", "GET").await,
            Err(AuthzError::Engine { action: "save policy", .. })
        ));
        assert!(!auth.users().group_exists("team1").await.unwrap());
        assert!(!auth
            .list_policies()
            .await
            .unwrap()
            .contains(&Policy::new("*", "docs", "GET")));

        engine.fail_save.store(false, Ordering::SeqCst);
        auth.create_user_group("team1").await.unwrap();
        auth.add_policy("*", "docs", "GET").await.unwrap();
    }

    let auth = AuthModule::from_file(&path).await.unwrap();
    assert!(auth.users().group_exists("team1").await.unwrap());
    assert!(auth
        .list_policies()
        .await
        .unwrap()
        .contains(&Policy::new("*", "docs", "GET")));
}

#[tokio::test]
async fn test_interrupted_group_removal_can_be_retried() {
    let engine = Arc::new(FaultyEngine::new().await);
    let auth = AuthModule::init(engine.clone()).await.unwrap();
    auth.create_user_group("team1").await.unwrap();
    auth.add_user_to_group("alice", &["team1"]).await.unwrap();
    auth.create_resource_group("docs").await.unwrap();
    auth.add_resource_to_group("/docs", &["docs"]).await.unwrap();
    auth.add_policy("team1", "docs", "GET").await.unwrap();

    engine.fail_remove_relations.store(true, Ordering::SeqCst);
    assert!(matches!(
        auth.remove_user_group("team1").await,
        Err(AuthzError::Engine { action: "remove group memberships", .. })
    ));
    assert!(auth.users().group_exists("team1").await.unwrap());

    engine.fail_remove_relations.store(false, Ordering::SeqCst);
    auth.remove_user_group("team1").await.unwrap();

    assert!(!auth.users().group_exists("team1").await.unwrap());
    assert!(!auth
        .list_policies()
        .await
        .unwrap()
        .contains(&Policy::new("team1", "docs", "GET")));
    assert!(auth.get_groups_for_user("alice").await.unwrap().is_empty());
    assert!(!auth.enforce("alice", "/docs", "GET").await.unwrap());
}

#[tokio::test]
async fn test_bootstrap_failure_propagates() {
    let engine = Arc::new(FaultyEngine::new().await);
    engine.fail_save.store(true, Ordering::SeqCst);

    assert!(matches!(
        AuthModule::init(engine).await,
        Err(AuthzError::Engine { .. })
    ));
}
