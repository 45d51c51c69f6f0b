//! Administrative REST surface over the group and policy managers.
//!
//! Routes, relative to where the router is mounted:
//!
//! | Method | Path                        | Operation                      |
//! |--------|-----------------------------|--------------------------------|
//! | GET    | `/{kind}/groups`            | list groups with member counts |
//! | POST   | `/{kind}/groups`            | create group                   |
//! | GET    | `/{kind}/groups/:group`     | members of a group             |
//! | DELETE | `/{kind}/groups/:group`     | remove group and its policies  |
//! | GET    | `/{kind}/memberships`       | every membership row           |
//! | POST   | `/{kind}/memberships`       | add entity to groups           |
//! | DELETE | `/{kind}/memberships`       | remove entity from groups      |
//! | GET    | `/{kind}/entity?name=`      | groups of one entity           |
//! | DELETE | `/{kind}/entity?name=`      | remove entity from all groups  |
//! | GET    | `/policies[?user_group=]`   | list policies                  |
//! | POST   | `/policies`                 | add policy                     |
//! | DELETE | `/policies`                 | remove policy                  |
//!
//! `{kind}` is `users` or `resources`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::ApiResponse;
use crate::error::Result;
use crate::rbac::{AuthModule, EntityKind, GroupManager, Policy, PolicyManager};

/// Router exposing every management operation of `auth`.
pub fn admin_router(auth: AuthModule) -> Router {
    Router::new()
        .nest("/users", group_routes(auth.users().clone()))
        .nest("/resources", group_routes(auth.resources().clone()))
        .merge(policy_routes(auth.policies().clone()))
}

fn group_routes<K: EntityKind>(groups: GroupManager<K>) -> Router {
    Router::new()
        .route("/groups", get(list_groups::<K>).post(create_group::<K>))
        .route(
            "/groups/:group",
            get(group_members::<K>).delete(remove_group::<K>),
        )
        .route(
            "/memberships",
            get(list_memberships::<K>)
                .post(add_memberships::<K>)
                .delete(remove_memberships::<K>),
        )
        .route(
            "/entity",
            get(entity_groups::<K>).delete(remove_entity::<K>),
        )
        .with_state(groups)
}

fn policy_routes(policies: PolicyManager) -> Router {
    Router::new()
        .route(
            "/policies",
            get(list_policies).post(add_policy).delete(remove_policy),
        )
        .with_state(policies)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub entity: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EntityQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PolicyQuery {
    pub user_group: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Group Handlers
// ═══════════════════════════════════════════════════════════════════════════════

async fn list_groups<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
) -> Result<impl IntoResponse> {
    Ok(Json(ApiResponse::success(groups.groups().await?)))
}

async fn create_group<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse> {
    groups.create_group(&req.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(serde_json::json!({ "name": req.name }))),
    ))
}

async fn group_members<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
    Path(group): Path<String>,
) -> Result<impl IntoResponse> {
    let members = groups.entities_in_group(&group).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "name": group,
        "members": members,
    }))))
}

async fn remove_group<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
    Path(group): Path<String>,
) -> Result<impl IntoResponse> {
    groups.remove_group(&group).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership Handlers
// ═══════════════════════════════════════════════════════════════════════════════

async fn list_memberships<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
) -> Result<impl IntoResponse> {
    Ok(Json(ApiResponse::success(groups.memberships().await?)))
}

async fn add_memberships<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
    Json(req): Json<MembershipRequest>,
) -> Result<impl IntoResponse> {
    let targets: Vec<&str> = req.groups.iter().map(String::as_str).collect();
    groups.add_to_group(&req.entity, &targets).await?;
    Ok(Json(ApiResponse::success(
        groups.groups_for_entity(&req.entity).await?,
    )))
}

async fn remove_memberships<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
    Json(req): Json<MembershipRequest>,
) -> Result<impl IntoResponse> {
    let targets: Vec<&str> = req.groups.iter().map(String::as_str).collect();
    groups.remove_from_group(&req.entity, &targets).await?;
    Ok(Json(ApiResponse::success(
        groups.groups_for_entity(&req.entity).await?,
    )))
}

async fn entity_groups<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
    Query(query): Query<EntityQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(ApiResponse::success(
        groups.groups_for_entity(&query.name).await?,
    )))
}

async fn remove_entity<K: EntityKind>(
    State(groups): State<GroupManager<K>>,
    Query(query): Query<EntityQuery>,
) -> Result<impl IntoResponse> {
    groups.remove_entity(&query.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Policy Handlers
// ═══════════════════════════════════════════════════════════════════════════════

async fn list_policies(
    State(policies): State<PolicyManager>,
    Query(query): Query<PolicyQuery>,
) -> Result<impl IntoResponse> {
    let list = match query.user_group {
        Some(group) => policies.policies_for_group(&group).await?,
        None => policies.list_policies().await?,
    };
    Ok(Json(ApiResponse::success(list)))
}

async fn add_policy(
    State(policies): State<PolicyManager>,
    Json(policy): Json<Policy>,
) -> Result<impl IntoResponse> {
    policies
        .add_policy(&policy.user_group, &policy.resource_group, &policy.action)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(policy))))
}

async fn remove_policy(
    State(policies): State<PolicyManager>,
    Json(policy): Json<Policy>,
) -> Result<impl IntoResponse> {
    policies
        .remove_policy(&policy.user_group, &policy.resource_group, &policy.action)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
